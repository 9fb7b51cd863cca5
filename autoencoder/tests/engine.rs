mod common;

use std::sync::Arc;

use autoencoder::{
    AutoEncoder, AutoEncoderConfig, AutoEncoderErr, FitOptions, LocalGroup, Phase, TrainData,
    loss::{baseline_output, feature_losses},
    preprocessing::prepare,
};
use tabular::{Column, DType, Frame, OTHER, Value};

use common::{EchoModel, sample_frame, small_config};

#[test]
fn fit_then_results_table() {
    let train = sample_frame(200, 0);
    let mut model = AutoEncoder::from_config(small_config()).unwrap();

    let options = FitOptions {
        epochs: 3,
        ..FitOptions::default()
    };
    model.fit(train.clone().into(), options).unwrap();
    assert_eq!(model.phase(), Phase::StatsCollected);
    assert_eq!(model.logger().history().epochs().len(), 3);

    let scored = sample_frame(50, 1);
    let results = model.results(&scored, true).unwrap();

    let expected = [
        "amount",
        "amount_pred",
        "amount_loss",
        "amount_z_loss",
        "flag",
        "flag_pred",
        "flag_loss",
        "flag_z_loss",
        "color",
        "color_pred",
        "color_loss",
        "color_z_loss",
        "max_abs_z",
        "mean_abs_z",
        "z_loss_scaler_type",
    ];
    assert_eq!(results.names(), expected);
    assert_eq!(results.nrows(), 50);

    let max_z = results.require("max_abs_z").unwrap();
    let mean_z = results.require("mean_abs_z").unwrap();
    for row in 0..50 {
        let (max, mean) = (max_z.get(row).as_f64().unwrap(), mean_z.get(row).as_f64().unwrap());
        assert!(max.is_finite() && mean >= 0. && max >= mean);
    }
    assert_eq!(results.require("z_loss_scaler_type").unwrap().get(0), Value::from("z"));
    assert_eq!(results.require("flag_pred").unwrap().dtype(), DType::Bool);

    let scores = model.anomaly_score(&scored).unwrap();
    assert_eq!(scores.len(), 50);
    assert!(scores.iter().all(|s| s.is_finite() && *s >= 0.));
}

#[test]
fn echo_model_reconstructs_its_input() {
    let train = sample_frame(120, 0);
    let mut model = AutoEncoder::new(small_config(), EchoModel::default(), None).unwrap();
    model.fit(train.clone().into(), FitOptions::default()).unwrap();

    let results = model.results(&train, false).unwrap();

    let amount = train.require("amount").unwrap();
    let predicted = results.require("amount_pred").unwrap();
    for row in 0..train.nrows() {
        let (x, y) = (amount.get(row).as_f64().unwrap(), predicted.get(row).as_f64().unwrap());
        assert!((x - y).abs() < 1e-3, "{x} reconstructed as {y}");
    }

    assert_eq!(results.require("flag_pred").unwrap(), train.require("flag").unwrap());
    assert_eq!(results.require("color_pred").unwrap(), train.require("color").unwrap());
}

#[test]
fn unseen_categories_decode_to_a_retained_one() {
    let train = sample_frame(120, 0);
    let mut model = AutoEncoder::new(small_config(), EchoModel::default(), None).unwrap();
    model.fit(train.into(), FitOptions::default()).unwrap();

    let scored = Frame::from_columns([
        ("amount", Column::from(vec![50.])),
        ("flag", Column::from(vec![true])),
        ("color", Column::from(vec!["purple"])),
    ])
    .unwrap();
    let results = model.results(&scored, true).unwrap();

    let predicted = results.require("color_pred").unwrap().get(0);
    assert_ne!(predicted, Value::from(OTHER));
    // ties in frequency keep the alphabetical order
    assert_eq!(predicted, Value::from("blue"));
    assert_eq!(results.require("color").unwrap().get(0), Value::from("purple"));
}

#[test]
fn validation_drives_early_stopping() {
    let config = AutoEncoderConfig {
        patience: 2,
        ..small_config()
    };
    let mut model = AutoEncoder::new(config, EchoModel::drifting(0.1), None).unwrap();

    let options = FitOptions {
        epochs: 10,
        val_data: Some(sample_frame(64, 1).into()),
        run_validation: true,
        ..FitOptions::default()
    };
    model.fit(sample_frame(120, 0).into(), options).unwrap();

    let history = model.logger().history();
    assert_eq!(history.epochs().len(), 3);
    assert!(history.baseline().is_some());

    let losses: Vec<_> = history
        .epochs()
        .iter()
        .map(|e| e.identity_validation_loss().unwrap())
        .collect();
    assert!(losses.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(model.phase(), Phase::StatsCollected);
}

#[test]
fn loss_stats_can_be_calibrated_on_validation_data() {
    let mut model = AutoEncoder::new(small_config(), EchoModel::default(), None).unwrap();

    let options = FitOptions {
        val_data: Some(sample_frame(64, 1).into()),
        use_val_for_loss_stats: true,
        ..FitOptions::default()
    };
    model.fit(sample_frame(120, 0).into(), options).unwrap();

    let stats = model.loss_stats().unwrap();
    assert!(stats.get("amount").is_some_and(|s| s.is_fitted()));
    assert!(stats.get("color").is_some());
}

#[test]
fn scoring_before_fit_is_an_error() {
    let mut model = AutoEncoder::from_config(small_config()).unwrap();
    let frame = sample_frame(10, 0);

    assert!(matches!(model.score(&frame), Err(AutoEncoderErr::NotFitted)));
    assert!(matches!(model.results(&frame, true), Err(AutoEncoderErr::NotFitted)));
    assert_eq!(model.phase(), Phase::Unbuilt);
}

#[test]
fn fit_argument_errors() {
    let mut model = AutoEncoder::from_config(small_config()).unwrap();
    let train: TrainData = sample_frame(40, 0).into();

    let ranked = FitOptions {
        rank: Some(0),
        world_size: Some(1),
        ..FitOptions::default()
    };
    assert!(matches!(
        model.fit(train.clone(), ranked),
        Err(AutoEncoderErr::InvalidArgument(_))
    ));

    let no_val = FitOptions {
        run_validation: true,
        ..FitOptions::default()
    };
    assert!(matches!(
        model.fit(train, no_val),
        Err(AutoEncoderErr::InvalidArgument(_))
    ));
    assert_eq!(model.phase(), Phase::Unbuilt);
}

#[test]
fn collective_must_match_the_mode() {
    let distributed = AutoEncoderConfig {
        distributed_training: true,
        ..small_config()
    };
    assert!(matches!(
        AutoEncoder::new(distributed, EchoModel::default(), None),
        Err(AutoEncoderErr::Configuration(_))
    ));

    assert!(matches!(
        AutoEncoder::new(small_config(), EchoModel::default(), Some(Arc::new(LocalGroup))),
        Err(AutoEncoderErr::Configuration(_))
    ));
}

#[test]
fn out_of_range_options_are_rejected() {
    let config = AutoEncoderConfig {
        swap_p: 1.5,
        ..small_config()
    };

    assert!(matches!(
        AutoEncoder::from_config(config),
        Err(AutoEncoderErr::Configuration(_))
    ));
}

#[test]
fn empty_frames_score_to_empty_results() {
    let mut model = AutoEncoder::new(small_config(), EchoModel::default(), None).unwrap();
    model.fit(sample_frame(120, 0).into(), FitOptions::default()).unwrap();

    let empty = sample_frame(0, 0);
    assert!(model.anomaly_score(&empty).unwrap().is_empty());
    assert_eq!(model.results(&empty, true).unwrap().nrows(), 0);
}

#[test]
fn learning_rate_decays_once_per_epoch() {
    let config = AutoEncoderConfig {
        lr: 0.01,
        lr_decay: Some(0.5),
        ..small_config()
    };
    let mut model = AutoEncoder::new(config, EchoModel::default(), None).unwrap();
    assert_eq!(model.learning_rate(), None);

    let options = FitOptions {
        epochs: 3,
        ..FitOptions::default()
    };
    model.fit(sample_frame(100, 0).into(), options).unwrap();

    let lr = model.learning_rate().unwrap();
    assert!((lr - 0.01 * 0.5f32.powi(3)).abs() < 1e-9, "lr is {lr}");
}

#[test]
fn baseline_sums_batch_losses_over_the_rows() {
    // without corruption every row echoes to the same loss, so each batch's net loss is equal
    let baseline = |eval_batch_size| {
        let config = AutoEncoderConfig {
            swap_p: 0.,
            eval_batch_size,
            ..small_config()
        };
        let mut model = AutoEncoder::new(config, EchoModel::default(), None).unwrap();

        let options = FitOptions {
            val_data: Some(sample_frame(100, 1).into()),
            run_validation: true,
            ..FitOptions::default()
        };
        model.fit(sample_frame(120, 0).into(), options).unwrap();

        let registry = model.registry().unwrap();
        let target = prepare(registry, &sample_frame(100, 1)).unwrap();
        let output = baseline_output(&target, &registry.cardinalities());
        let batch_loss = feature_losses(&output, &target).unwrap().breakdown().net_loss();

        (model.logger().history().baseline().unwrap(), batch_loss)
    };

    // 64 + 36 rows
    let (partial, batch_loss) = baseline(64);
    assert!(batch_loss > 0.);
    assert!((partial - 2. * batch_loss / 100.).abs() < 1e-6);

    let (whole, _) = baseline(100);
    assert!((whole - batch_loss / 100.).abs() < 1e-6);
}

#[test]
fn per_feature_z_losses_follow_return_abs() {
    let mut model = AutoEncoder::from_config(small_config()).unwrap();
    model.fit(sample_frame(200, 0).into(), FitOptions::default()).unwrap();

    let scored = sample_frame(50, 1);
    let signed = model.results(&scored, false).unwrap();
    let absolute = model.results(&scored, true).unwrap();

    let mut negatives = 0;
    for name in ["amount", "flag", "color"] {
        let column = format!("{name}_z_loss");
        let (signed, absolute) = (signed.require(&column).unwrap(), absolute.require(&column).unwrap());

        for row in 0..scored.nrows() {
            let (z, abs) = (signed.get(row).as_f64().unwrap(), absolute.get(row).as_f64().unwrap());
            assert_eq!(z.abs(), abs);
            negatives += usize::from(z < 0.);
        }
    }
    assert!(negatives > 0, "z scores center on the calibration losses");
}

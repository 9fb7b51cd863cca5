mod common;

use std::{sync::Arc, thread};

use autoencoder::{
    AutoEncoder, AutoEncoderConfig, Collective, FitOptions, FrameDataset, ShardSpec,
    ShardedLoader, ThreadGroup, TrainData, loss::FeatureLosses,
};
use machine_learning::arch::FeedForwardAutoEncoder;
use tabular::Frame;

use common::{EchoModel, sample_frame, small_config};

const WORLD_SIZE: usize = 2;

fn distributed_config() -> AutoEncoderConfig {
    AutoEncoderConfig {
        distributed_training: true,
        ..small_config()
    }
}

fn shard_of(frame: Frame, rank: usize) -> TrainData {
    let dataset = FrameDataset::training(frame, 32);
    ShardedLoader::new(dataset, ShardSpec::new(rank, WORLD_SIZE).unwrap(), 3).into()
}

fn shard(rank: usize) -> TrainData {
    shard_of(sample_frame(150, 0), rank)
}

fn ranked(rank: usize) -> FitOptions {
    FitOptions {
        rank: Some(rank),
        world_size: Some(WORLD_SIZE),
        ..FitOptions::default()
    }
}

/// Trains a `FeedForwardAutoEncoder` on every rank of a thread group for two epochs.
///
/// # Returns
/// Every rank's losses on `scored` and whether it collected the loss statistics.
fn train_ranks(
    config: AutoEncoderConfig,
    train: Frame,
    scored: &Frame,
) -> Vec<(FeatureLosses, bool)> {
    thread::scope(|s| {
        let handles: Vec<_> = ThreadGroup::new(WORLD_SIZE)
            .into_iter()
            .map(|group| {
                let (config, train) = (config.clone(), train.clone());
                s.spawn(move || {
                    let rank = group.rank();
                    let model = FeedForwardAutoEncoder::new(config.model.shape(config.seed));
                    let mut ae = AutoEncoder::new(config, model, Some(Arc::new(group))).unwrap();

                    let options = FitOptions {
                        epochs: 2,
                        ..ranked(rank)
                    };
                    ae.fit(shard_of(train, rank), options).unwrap();

                    (ae.score(scored).unwrap(), ae.loss_stats().is_some())
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn ranks_stay_in_sync() {
    let results = train_ranks(distributed_config(), sample_frame(150, 0), &sample_frame(40, 1));

    let (leader, follower) = (&results[0], &results[1]);
    assert_eq!(leader.0, follower.0);
    assert!(leader.1, "the leader collects the loss statistics");
    assert!(!follower.1);
}

#[test]
fn unseeded_ranks_start_from_the_leaders_weights() {
    let config = AutoEncoderConfig {
        seed: None,
        ..distributed_config()
    };
    let results = train_ranks(config, sample_frame(150, 0), &sample_frame(40, 1));

    assert_eq!(results[0].0, results[1].0);
}

#[test]
fn ranks_stay_in_sync_without_binary_or_numeric_columns() {
    let without = |dropped: &str| {
        let frame = sample_frame(150, 0);
        let columns = frame
            .iter()
            .filter(|(name, _)| *name != dropped)
            .map(|(name, column)| (name.to_string(), column.clone()));
        Frame::from_columns(columns).unwrap()
    };

    for dropped in ["flag", "amount"] {
        let train = without(dropped);
        let scored = train.slice(0..40);

        let results = train_ranks(distributed_config(), train, &scored);
        assert_eq!(results[0].0, results[1].0, "without {dropped}");
    }
}

#[test]
fn every_rank_follows_the_leaders_stop() {
    let epochs: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = ThreadGroup::new(WORLD_SIZE)
            .into_iter()
            .map(|group| {
                s.spawn(move || {
                    let rank = group.rank();
                    let config = AutoEncoderConfig {
                        patience: 1,
                        ..distributed_config()
                    };
                    let model = EchoModel::drifting(0.1);
                    let mut ae = AutoEncoder::new(config, model, Some(Arc::new(group))).unwrap();

                    let options = FitOptions {
                        epochs: 10,
                        val_data: Some(sample_frame(48, 2).into()),
                        run_validation: true,
                        ..ranked(rank)
                    };
                    ae.fit(shard(rank), options).unwrap();

                    ae.logger().history().epochs().len()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(epochs, [2, 2]);
}

#[test]
fn mismatched_rank_is_rejected() {
    let group = ThreadGroup::new(1).remove(0);
    let config = AutoEncoderConfig {
        distributed_training: true,
        ..small_config()
    };
    let mut ae = AutoEncoder::new(config, EchoModel::default(), Some(Arc::new(group))).unwrap();

    assert!(ae.fit(sample_frame(20, 0).into(), ranked(1)).is_err());
    assert!(ae.fit(sample_frame(20, 0).into(), FitOptions::default()).is_err());
}

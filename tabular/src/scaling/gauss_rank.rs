use super::stats;

const EPSILON: f64 = 0.001;
const UPPER: f64 = 1. - EPSILON;
const LOWER: f64 = -1. + EPSILON;
const RANGE: f64 = UPPER - LOWER;

/// Inverse error function.
///
/// Uses M. Giles' polynomial approximation ("Approximating the erfinv function", 2010), which is
/// accurate to about single precision. Returns `±inf` at `±1` and `NaN` outside `[-1, 1]`.
pub fn erfinv(x: f64) -> f64 {
    if !(-1. ..=1.).contains(&x) {
        return f64::NAN;
    }

    if x.abs() == 1. {
        return x * f64::INFINITY;
    }

    let w = -((1. - x) * (1. + x)).ln();
    let p = if w < 5. {
        let w = w - 2.5;
        [
            2.810_226_36e-08,
            3.432_739_39e-07,
            -3.523_387_7e-06,
            -4.391_506_54e-06,
            0.000_218_580_87,
            -0.001_253_725_03,
            -0.004_177_681_64,
            0.246_640_727,
            1.501_409_41,
        ]
        .into_iter()
        .reduce(|p, c| c + p * w)
    } else {
        let w = w.sqrt() - 3.;
        [
            -0.000_200_214_257,
            0.000_100_950_558,
            0.001_349_343_22,
            -0.003_673_428_44,
            0.005_739_507_73,
            -0.007_622_461_3,
            0.009_438_870_47,
            1.001_674_06,
            2.832_976_82,
        ]
        .into_iter()
        .reduce(|p, c| c + p * w)
    };

    p.unwrap_or_default() * x
}

/// Fits the knots of a rank-gauss transform.
///
/// The sorted sample is mapped onto evenly spaced points of `(-1 + eps, 1 - eps)` and then
/// through `erfinv`. Tied values share the average of their ranks' targets so that the knots
/// are strictly increasing in both coordinates.
///
/// # Returns
/// The `(x, z)` knots.
pub(crate) fn fit(sample: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n < 2 {
        return (sorted, vec![0.; n]);
    }

    let divider = (n - 1) as f64 / RANGE;
    let mut xs: Vec<f64> = Vec::new();
    let mut zs: Vec<f64> = Vec::new();

    let mut start = 0;
    while start < n {
        let x = sorted[start];
        let end = start + sorted[start..].partition_point(|&v| v == x);

        let targets: Vec<f64> = (start..end)
            .map(|j| erfinv(j as f64 / divider - UPPER))
            .collect();

        xs.push(x);
        zs.push(stats::mean(&targets));
        start = end;
    }

    (xs, zs)
}

/// Piecewise-linear interpolation through the knots `(xs, ys)`, extrapolating linearly with the
/// first and last segments. `xs` must be strictly increasing.
pub(crate) fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    match xs.len() {
        0 => f64::NAN,
        1 => ys[0],
        len => {
            let i = xs.partition_point(|&k| k < x).clamp(1, len - 1);
            let (x0, x1) = (xs[i - 1], xs[i]);
            let (y0, y1) = (ys[i - 1], ys[i]);
            y0 + (x - x0) * (y1 - y0) / (x1 - x0)
        }
    }
}

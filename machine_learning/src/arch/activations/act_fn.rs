use super::{Relu, Sigmoid, Tanh};

/// An elementwise activation function together with its derivative.
#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        ActFn::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        ActFn::Relu(Relu)
    }

    pub fn tanh() -> Self {
        ActFn::Tanh(Tanh)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.f(x),
            ActFn::Relu(a) => a.f(x),
            ActFn::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.df(x),
            ActFn::Relu(a) => a.df(x),
            ActFn::Tanh(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered() {
        let act = ActFn::sigmoid(1.);
        assert!((act.f(0.) - 0.5).abs() < 1e-6);
        assert!((act.df(0.) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn relu_clips_negatives() {
        let act = ActFn::relu();
        assert_eq!(act.f(-2.), 0.);
        assert_eq!(act.f(3.), 3.);
        assert_eq!(act.df(-2.), 0.);
        assert_eq!(act.df(3.), 1.);
    }

    #[test]
    fn tanh_derivative_matches_definition() {
        let act = ActFn::tanh();
        let x = 0.3f32;
        assert!((act.df(x) - (1. - x.tanh().powi(2))).abs() < 1e-6);
    }
}

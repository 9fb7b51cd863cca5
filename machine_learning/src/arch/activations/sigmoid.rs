/// The logistic function scaled by `amp`, the binary head's squashing into probabilities when
/// `amp` is one.
#[derive(Clone, Debug)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    fn unit(z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp * Self::unit(z)
    }

    pub fn df(&self, z: f32) -> f32 {
        let s = Self::unit(z);
        self.amp * s * (1. - s)
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_without_nans() {
        let sigmoid = Sigmoid::default();

        assert_eq!(sigmoid.f(-200.), 0.);
        assert_eq!(sigmoid.f(200.), 1.);
        assert_eq!(sigmoid.df(-200.), 0.);
        assert_eq!(sigmoid.df(200.), 0.);
    }
}

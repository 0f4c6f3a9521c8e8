//! MIPS (maximum inner product search) → L2 injection: lifts an
//! unnormalized inner-product query into a squared-Euclidean-comparable
//! proxy so any L2 graph can serve it.

use crate::kernel::scalar::{mips_l2_eps_nonzero, mips_l2_eps_zero};

/// Precomputed norms needed by the injection formula.
#[derive(Clone, Copy, Debug)]
pub struct MipsContext {
    /// `ε²`; `0.0` selects the simpler branch.
    pub eps_sq: f32,
}

impl MipsContext {
    /// Computes the injected squared distance for one (query, db) pair
    /// given their raw inner product and squared norms.
    #[must_use]
    pub fn inject(&self, ip: f32, norm_u_sq: f32, norm_v_sq: f32) -> f32 {
        if self.eps_sq == 0.0 {
            mips_l2_eps_zero(ip, norm_u_sq, norm_v_sq)
        } else {
            mips_l2_eps_nonzero(ip, norm_u_sq, norm_v_sq, self.eps_sq)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eps_zero_branch_selected() {
        let ctx = MipsContext { eps_sq: 0.0 };
        assert!((ctx.inject(1.0, 2.0, 2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn eps_nonzero_degrades_on_negative_radicand() {
        let ctx = MipsContext { eps_sq: 10.0 };
        // norm_u_sq large enough to push the radicand negative.
        let got = ctx.inject(1.0, 100.0, 100.0);
        let want = 2.0 * (1.0 - 10.0 * 1.0);
        assert!((got - want).abs() < 1e-4);
    }
}

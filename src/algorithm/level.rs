//! Level assignment: `L = floor(-ln(U) * mL)`, capped at `l_max`.

use rand::Rng;

/// Draws a level for a new node, deterministic given `rng`'s seeded state.
/// `level_mult` is `HnswParams::level_mult()` (`1/ln(scaling_factor)`).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn draw_level(rng: &mut impl Rng, level_mult: f32, l_max: u8) -> u8 {
    // `gen_range` excludes 0.0 (`-ln(0)` is infinite) and includes values
    // arbitrarily close to 1.0, matching the textbook `U ~ (0, 1]` draw.
    let u: f32 = 1.0 - rng.gen::<f32>();
    let level = (-u.ln() * level_mult).floor();
    if level < 0.0 {
        0
    } else {
        (level as u32).min(u32::from(l_max)) as u8
    }
}

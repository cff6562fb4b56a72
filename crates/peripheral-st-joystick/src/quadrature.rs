//! Decoder for an original ST mouse on the joystick pins.

/// Edge count for a (previous, current) pair of 2-bit phases, indexed by
/// `prev << 2 | cur`. Impossible double transitions count as zero.
const QUAD_LUT: [i8; 16] = [
    0, 1, -1, 0, //
    -1, 0, 0, 1, //
    1, 0, 0, -1, //
    0, -1, 1, 0,
];

/// Edges per sample beyond this are clamped.
const MAX_EDGES: i8 = 2;

/// Speed for a single edge in one sample.
const SPEED_ONE_EDGE: i32 = 50;

/// Speed for two or more edges in one sample.
const SPEED_SATURATED: i32 = 100;

const SPEED_LIMIT: i32 = 127;

#[must_use]
pub fn quad_delta(prev: u8, cur: u8) -> i8 {
    QUAD_LUT[usize::from(((prev & 3) << 2) | (cur & 3))]
}

/// Map an edge count to mouse speed units.
#[must_use]
pub fn edges_to_speed(edges: i8) -> i32 {
    let edges = edges.clamp(-MAX_EDGES, MAX_EDGES);
    let speed = match edges.unsigned_abs() {
        0 => 0,
        1 => SPEED_ONE_EDGE,
        _ => SPEED_SATURATED,
    };
    let speed = if edges < 0 { -speed } else { speed };
    speed.clamp(-SPEED_LIMIT, SPEED_LIMIT)
}

/// Tracks the previous X/Y phases between samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadratureDecoder {
    previous: Option<(u8, u8)>,
}

impl QuadratureDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// Feed the current X and Y phases; returns the speed for each axis.
    /// The first sample only records the starting phases.
    pub fn sample(&mut self, x: u8, y: u8) -> (i32, i32) {
        let (px, py) = self.previous.unwrap_or((x, y));
        self.previous = Some((x, y));
        (
            edges_to_speed(quad_delta(px, x)),
            edges_to_speed(quad_delta(py, y)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_sequence_counts_positive() {
        // 00 -> 01 -> 11 -> 10 -> 00
        let seq = [0b00, 0b01, 0b11, 0b10, 0b00];
        for pair in seq.windows(2) {
            assert_eq!(quad_delta(pair[0], pair[1]), 1);
            assert_eq!(quad_delta(pair[1], pair[0]), -1);
        }
    }

    #[test]
    fn no_change_or_skip_is_zero() {
        for p in 0..4 {
            assert_eq!(quad_delta(p, p), 0);
        }
        assert_eq!(quad_delta(0b00, 0b11), 0);
        assert_eq!(quad_delta(0b01, 0b10), 0);
    }

    #[test]
    fn speed_tiers() {
        assert_eq!(edges_to_speed(0), 0);
        assert_eq!(edges_to_speed(1), 50);
        assert_eq!(edges_to_speed(-1), -50);
        assert_eq!(edges_to_speed(2), 100);
        assert_eq!(edges_to_speed(-5), -100);
    }

    #[test]
    fn first_sample_is_silent() {
        let mut d = QuadratureDecoder::new();
        assert_eq!(d.sample(0b01, 0b10), (0, 0));
        assert_eq!(d.sample(0b11, 0b10), (50, 0));
    }
}

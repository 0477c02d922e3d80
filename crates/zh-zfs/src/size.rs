// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde::Serialize;

/// Divisor and suffixes used to render a [`Size`].
#[derive(Debug, Clone, Copy)]
pub struct SizeScale {
    pub divisor: u32,
    /// Suffixes in increasing order of magnitude.
    pub suffixes: &'static [&'static str],
}

/// Powers of 1024.
pub const SIZE_SCALE_BINARY: SizeScale = SizeScale {
    divisor: 1024,
    suffixes: &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB"],
};

/// Byte count with a human-readable rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Size(pub i64);

impl Size {
    pub fn bytes(self) -> i64 {
        self.0
    }

    pub fn format(self, precision: usize, scale: SizeScale) -> String {
        let divisor = f64::from(scale.divisor);
        let mut value = self.0 as f64;
        let mut power = 0;
        while value >= divisor && power + 1 < scale.suffixes.len() {
            power += 1;
            value /= divisor;
        }
        let suffix = scale.suffixes.get(power).copied().unwrap_or_default();
        format!("{value:.precision$}{suffix}")
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format(1, SIZE_SCALE_BINARY))
    }
}

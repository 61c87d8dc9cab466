//! Wavelength constants (Angstrom, air) used by the optional clipping stages.

/// Telluric O2 A-band.
pub const TELLURIC_A_BAND: (f64, f64) = (7575.0, 7675.0);

/// Strong night-sky emission lines: [O I] 5577, 6300, 6364.
pub const SKY_LINES: [f64; 3] = [5577.0, 6300.2, 6364.0];

/// Half-width clipped around each night-sky line.
pub const SKY_LINE_HALF_WIDTH: f64 = 40.0;

/// Rest wavelengths of common host-galaxy H II region lines:
/// [O II], H-beta, [O III] doublet, [N II] doublet around H-alpha, [S II].
pub const HOST_EMISSION_LINES: [f64; 9] = [
    3727.3, 4861.3, 4958.9, 5006.8, 6548.1, 6562.8, 6583.6, 6716.4, 6730.8,
];

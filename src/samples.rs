//! Sample equations for demonstration and smoke testing.
//!
//! Backslashes are literal here (raw strings), exactly as a user would type
//! them.

/// Sum of the first `N` integers.
pub fn arithmetic_series() -> &'static str {
    r"\sum_{i=1}^{N} i = \frac{n(n + 1)}{2}"
}

/// A fraction, a Greek letter and a product.
pub fn fraction_and_pi() -> &'static str {
    r"\frac{1}{2} + \pi \cdot 2"
}

/// No commands at all.
pub fn plain_arithmetic() -> &'static str {
    "1 - 0 = 1"
}

/// Euler's identity.
pub fn euler_identity() -> &'static str {
    r"e^{i\pi} + 1 = 0"
}

/// Quadratic formula, with a square root and `\pm`.
pub fn quadratic_formula() -> &'static str {
    r"x = \frac{-b \pm \sqrt{b^2 - 4ac}}{2a}"
}

/// A 2×2 matrix environment (exercises `\\` row separators).
pub fn matrix() -> &'static str {
    r"\begin{pmatrix} a & b \\ c & d \end{pmatrix}"
}

/// Every sample with a short name.
pub fn all() -> Vec<(&'static str, &'static str)> {
    vec![
        ("arithmetic_series", arithmetic_series()),
        ("fraction_and_pi", fraction_and_pi()),
        ("plain_arithmetic", plain_arithmetic()),
        ("euler_identity", euler_identity()),
        ("quadratic_formula", quadratic_formula()),
        ("matrix", matrix()),
    ]
}

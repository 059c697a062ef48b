//! Platform reference counting across engine lifetimes.
//!
//! Kept in its own test binary: the counts below are process-wide, so no
//! other test may create engines concurrently.

use latex_forge::platform;
use latex_forge::Latex;

const LIBRARY: &str = "var katex = { renderToString: function (s) { return s; } };";

#[test]
fn platform_lives_exactly_as_long_as_its_engines() {
    assert!(!platform::is_initialized());
    assert_eq!(platform::live_handles(), 0);

    let a = Latex::new(LIBRARY).unwrap();
    assert!(platform::is_initialized());
    assert_eq!(platform::live_handles(), 1);
    let first_generation = platform::acquire().generation();

    let b = a.try_clone().unwrap();
    assert_eq!(platform::live_handles(), 2);

    drop(a);
    assert!(platform::is_initialized());
    assert_eq!(platform::live_handles(), 1);
    assert_eq!(b.render_fragment("x").unwrap(), "x");

    drop(b);
    assert!(!platform::is_initialized());
    assert_eq!(platform::live_handles(), 0);

    // Coming back up is a fresh initialisation.
    let c = Latex::new(LIBRARY).unwrap();
    assert!(platform::acquire().generation() > first_generation);

    // A failed construction gives its reference back.
    assert!(Latex::new("throw new Error('broken bundle');").is_err());
    assert_eq!(platform::live_handles(), 1);

    // Moving out does not touch the count; dropping the moved-from shell
    // does not either.
    let mut c = c;
    let moved = c.take();
    drop(c);
    assert_eq!(platform::live_handles(), 1);
    drop(moved);
    assert_eq!(platform::live_handles(), 0);
}

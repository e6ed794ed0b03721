//! Scenario tests that drive whole rotations on a simulated clock.

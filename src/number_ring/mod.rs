
///
/// The ring `Z/tZ[X]/(X^N + 1)` for a power-of-two `N`, with elements stored in coefficient
/// representation.
///
pub mod negacyclic;

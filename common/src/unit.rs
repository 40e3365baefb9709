//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity allocation.
#[derive(Clone, Copy, Debug)]
pub struct Allocation;

/// Marker type describing an entity confirmation.
#[derive(Clone, Copy, Debug)]
pub struct Confirmation;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing an entity receipt.
#[derive(Clone, Copy, Debug)]
pub struct Receipt;

/// Marker type describing an entity start.
#[derive(Clone, Copy, Debug)]
pub struct Start;

/// Marker type describing an entity end.
#[derive(Clone, Copy, Debug)]
pub struct End;

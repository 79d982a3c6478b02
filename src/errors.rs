use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IPError
{
    MaxMeshSizeExceeded,
    MaxDurationExceeded,
    InvalidSample,
    ShapeMismatch,
    InvalidBoundingBox,
    InvalidTolerance,
    InvalidOptions,
    UnsupportedKernel,
}

impl IPError
{
    /// True for the errors raised when a refinement budget runs out.
    pub fn is_resource_exhausted(&self) -> bool
    {
        matches!(self, IPError::MaxMeshSizeExceeded | IPError::MaxDurationExceeded)
    }
}

impl std::error::Error for IPError {}

impl Display for IPError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}

#[test]
fn resource_errors_are_grouped()
{
    assert!(IPError::MaxMeshSizeExceeded.is_resource_exhausted());
    assert!(IPError::MaxDurationExceeded.is_resource_exhausted());
    assert!(!IPError::InvalidSample.is_resource_exhausted());
    assert_eq!(IPError::ShapeMismatch.to_string(), "ShapeMismatch");
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

///
/// Controls for `build`. Unset budgets mean no limit; a target that never
/// converges then refines forever.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions
{
    /// Samples per axis of the first mesh. At least 2.
    pub initial_resolution: usize,
    /// Largest mesh (total number of points) the build may sample.
    pub max_mesh_size: Option<usize>,
    /// Wall-clock budget, checked before every probe.
    pub max_duration: Option<Duration>,
    /// Record the range of every output channel seen while refining.
    pub track_output_box: bool,
}

impl Default for BuildOptions
{
    fn default() -> Self
    {
        Self { initial_resolution: 4, max_mesh_size: None, max_duration: None, track_output_box: false }
    }
}

impl BuildOptions
{
    pub fn new(initial_resolution: usize) -> Self
    {
        Self { initial_resolution, ..Default::default() }
    }

    pub fn with_max_mesh_size(mut self, max_mesh_size: usize) -> Self
    {
        self.max_mesh_size = Some(max_mesh_size);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self
    {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn with_output_box(mut self, track: bool) -> Self
    {
        self.track_output_box = track;
        self
    }
}

#[test]
fn setters_and_defaults()
{
    let options = BuildOptions::default().with_max_mesh_size(1000).with_max_duration(Duration::from_millis(250)).with_output_box(true);
    assert_eq!(options.initial_resolution, 4);
    assert_eq!(options.max_mesh_size, Some(1000));
    assert_eq!(options.max_duration, Some(Duration::from_millis(250)));
    assert!(options.track_output_box);
    assert_eq!(BuildOptions::new(7).initial_resolution, 7);
}

#[test]
fn parse_partial_config()
{
    let options: BuildOptions = serde_json::from_str(r#"{"max_mesh_size": 5000, "max_duration": {"secs": 2, "nanos": 0}}"#).unwrap();
    assert_eq!(options.initial_resolution, 4);
    assert_eq!(options.max_mesh_size, Some(5000));
    assert_eq!(options.max_duration, Some(Duration::from_secs(2)));
    assert!(!options.track_output_box);
}

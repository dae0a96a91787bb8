//! Known-good configuration artifact used for recovery.

/// Canonical configuration with every section and field the external
/// parser requires. Color fields are `r,g,b` triples.
pub const CANONICAL_CONFIG: &str = "[configuration]
  display = 1
  led = 1
  simulation = 1
  mqtt = 1
  robot = 5
  obstacle = 5
  seed = 150
  field = 1
  debug = 0
  waittime = 50
  step=1200

[environment]
  rows = 20
  columns = 20

[display]
  x = 210
  y = 210
  width = 1285
  height = 650
  title = Display grid


[color]
  robot = 0,255,0
  goal = 50,50,50
  other = 255,233,0
  obstacle = 0,0,0
  unknown = 50,50,0
  package = 255,200,0
  startzone = 255,255,255
  transitzone = 0,0,255
  exit = 255,0,0
";

/// Sections the canonical artifact must contain.
pub const REQUIRED_SECTIONS: [&str; 4] = ["configuration", "environment", "display", "color"];

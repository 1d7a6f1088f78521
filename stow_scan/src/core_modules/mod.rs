// THEORY:
// `core_modules` holds the vision stages of the detector, ordered from raw
// pixels to a single steering target:
// intensity -> background_model -> foreground_mask -> region_detector
// -> motion_detector. `motion_region` is the shared output type.

pub mod background_model;
pub mod foreground_mask;
pub mod intensity;
pub mod motion_detector;
pub mod motion_region;
pub mod region_detector;

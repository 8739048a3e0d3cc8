#[allow(non_snake_case)]
pub mod Chemistry;
#[allow(non_snake_case)]
pub mod FiniteVolume;
#[allow(non_snake_case)]
pub mod LowMachSolver;
#[allow(non_snake_case)]
pub mod Thermophysics;
pub mod settings;

//! Accelerator detection and precision choice for in-process inference.
//!
//! Priority: CUDA (bf16) → Metal (f32) → CPU (bf16). Metal kernels for
//! bf16 matmuls are incomplete, so Apple GPUs run in full precision.

use candle_core::{DType, Device};
use std::fmt;
use tracing::info;

/// Reports which accelerators this process can use.
pub trait AcceleratorProbe {
    fn cuda_available(&self) -> bool;
    fn metal_available(&self) -> bool;
}

/// Asks candle what the current build and machine support.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl AcceleratorProbe for SystemProbe {
    fn cuda_available(&self) -> bool {
        candle_core::utils::cuda_is_available()
    }

    fn metal_available(&self) -> bool {
        candle_core::utils::metal_is_available()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cuda,
    Metal,
    Cpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Cuda => "cuda",
            DeviceKind::Metal => "metal",
            DeviceKind::Cpu => "cpu",
        })
    }
}

/// Device and preferred tensor precision. LightOnOCR falls back to F32
/// where the device has no BF16 support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChoice {
    pub kind: DeviceKind,
    pub dtype: DType,
}

impl DeviceChoice {
    /// Open the first device of the chosen kind.
    pub fn device(&self) -> candle_core::Result<Device> {
        match self.kind {
            DeviceKind::Cuda => Device::new_cuda(0),
            DeviceKind::Metal => Device::new_metal(0),
            DeviceKind::Cpu => Ok(Device::Cpu),
        }
    }
}

/// Pick the best available device.
pub fn select_device(probe: &dyn AcceleratorProbe) -> DeviceChoice {
    let choice = if probe.cuda_available() {
        DeviceChoice {
            kind: DeviceKind::Cuda,
            dtype: DType::BF16,
        }
    } else if probe.metal_available() {
        DeviceChoice {
            kind: DeviceKind::Metal,
            dtype: DType::F32,
        }
    } else {
        DeviceChoice {
            kind: DeviceKind::Cpu,
            dtype: DType::BF16,
        }
    };
    info!(device = %choice.kind, dtype = ?choice.dtype, "Selected inference device");
    choice
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        cuda: bool,
        metal: bool,
    }

    impl AcceleratorProbe for Fixed {
        fn cuda_available(&self) -> bool {
            self.cuda
        }
        fn metal_available(&self) -> bool {
            self.metal
        }
    }

    #[test]
    fn cuda_wins_over_metal() {
        let c = select_device(&Fixed {
            cuda: true,
            metal: true,
        });
        assert_eq!(c.kind, DeviceKind::Cuda);
        assert_eq!(c.dtype, DType::BF16);
    }

    #[test]
    fn metal_runs_full_precision() {
        let c = select_device(&Fixed {
            cuda: false,
            metal: true,
        });
        assert_eq!(c.kind, DeviceKind::Metal);
        assert_eq!(c.dtype, DType::F32);
    }

    #[test]
    fn cpu_fallback() {
        let c = select_device(&Fixed {
            cuda: false,
            metal: false,
        });
        assert_eq!(
            c,
            DeviceChoice {
                kind: DeviceKind::Cpu,
                dtype: DType::BF16
            }
        );
        assert!(matches!(c.device().unwrap(), Device::Cpu));
    }
}

//! Backend availability, resolved once at startup.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::registry::BackendKind;

/// Compute device handed to backends that can use an accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    /// CUDA when the NVIDIA kernel driver is loaded, CPU otherwise.
    pub fn detect() -> Self {
        if Path::new("/proc/driver/nvidia/version").exists() {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }
}

/// Toolkit program looked up when none is configured.
pub const DEFAULT_TOOLKIT_PROGRAM: &str = "tts";

/// Which backend families this process can actually use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// ONNX pipeline inference was compiled in (`vits` feature).
    pub pipeline: bool,
    /// `toolkit_program` resolved to an executable.
    pub toolkit: bool,
    /// Program the toolkit backend runs; detection was made against it.
    pub toolkit_program: String,
    pub device: Device,
}

impl Capabilities {
    pub fn detect(toolkit_program: &str) -> Self {
        let pipeline = cfg!(feature = "vits");
        let toolkit = find_program(toolkit_program).is_some();
        let device = Device::detect();

        if pipeline {
            log::info!("Pipeline inference available (ONNX runtime)");
        } else {
            log::warn!("Pipeline inference not compiled in; enable the `vits` feature");
        }
        if toolkit {
            log::info!("Toolkit program '{toolkit_program}' found");
        } else {
            log::warn!("Toolkit program '{toolkit_program}' not found on PATH");
        }
        log::info!("Compute device: {device:?}");

        Self {
            pipeline,
            toolkit,
            toolkit_program: toolkit_program.to_string(),
            device,
        }
    }

    /// Nothing but the synthetic tone.
    pub fn none() -> Self {
        Self {
            pipeline: false,
            toolkit: false,
            toolkit_program: DEFAULT_TOOLKIT_PROGRAM.to_string(),
            device: Device::Cpu,
        }
    }

    pub fn all() -> Self {
        Self {
            pipeline: true,
            toolkit: true,
            toolkit_program: DEFAULT_TOOLKIT_PROGRAM.to_string(),
            device: Device::Cpu,
        }
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::PipelineInference => self.pipeline,
            BackendKind::ToolkitInference => self.toolkit,
            BackendKind::Synthetic => true,
        }
    }
}

/// Resolve a program to an executable file, searching `PATH` for bare names.
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Like [`find_program`], searching `paths` instead of `PATH`.
pub fn find_program_in(program: &str, paths: &OsStr) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    which::which_in(program, Some(paths), cwd).ok()
}

//! Deterministic solver and atlas doubles.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use synsat::{Atlas, AtlasKind, Gas, ProfileBatch, Solver, SolverOptions, SurfEmisRefl};

#[derive(Debug, thiserror::Error)]
pub enum FakeError {
    #[error("fake solver failed on call {0}")]
    Call(usize),
    #[error("fake solver has no profiles")]
    NoProfiles,
    #[error("fake atlas unavailable")]
    Atlas,
}

/// Channel `c` of profile `p` is `skin + 100 c`, plus a cloud and zenith
/// term on every channel after the first.
#[derive(Debug, Default)]
pub struct FakeSolver {
    pub coef_file: Option<PathBuf>,
    pub channels: Vec<u16>,
    pub options: Option<SolverOptions>,
    pub batch_sizes: Vec<usize>,
    pub surfs: Vec<SurfEmisRefl>,
    pub fail_on_call: Option<usize>,
    batch: Option<ProfileBatch>,
    result: Vec<f64>,
}

impl FakeSolver {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Default::default()
        }
    }
}

impl Solver for FakeSolver {
    type Error = FakeError;

    fn load_instrument(&mut self, coef_file: &Path, channels: &[u16], options: &SolverOptions) -> Result<(), FakeError> {
        self.coef_file = Some(coef_file.to_path_buf());
        self.channels = channels.to_vec();
        self.options = Some(options.clone());
        Ok(())
    }

    fn set_profiles(&mut self, batch: &ProfileBatch) -> Result<(), FakeError> {
        self.batch = Some(batch.clone());
        Ok(())
    }

    fn set_surf_emis_refl(&mut self, surf: &SurfEmisRefl) -> Result<(), FakeError> {
        self.surfs.push(surf.clone());
        Ok(())
    }

    fn run_direct(&mut self) -> Result<(), FakeError> {
        let batch = self.batch.as_ref().ok_or(FakeError::NoProfiles)?;
        self.batch_sizes.push(batch.len());
        if self.fail_on_call == Some(self.batch_sizes.len()) {
            self.result.clear();
            return Err(FakeError::Call(self.batch_sizes.len()));
        }

        let nlev = batch.nlevels;
        let frozen = batch.gas(Gas::FrozenCondensate);
        self.result = (0..batch.len())
            .flat_map(|p| {
                let cloud: f64 = frozen[p * nlev..(p + 1) * nlev].iter().sum();
                let base = batch.skin[p][0];
                let zenith = batch.angles[p][0];
                (0..self.channels.len()).map(move |c| {
                    if c == 0 {
                        base
                    } else {
                        base + 100.0 * c as f64 + 1e3 * cloud + 1e-3 * zenith
                    }
                })
            })
            .collect();
        Ok(())
    }

    fn bt_refl(&self) -> Result<Vec<f64>, FakeError> {
        Ok(self.result.clone())
    }
}

/// Returns a constant for every profile and channel.
#[derive(Debug)]
pub struct FakeAtlas {
    pub kind: AtlasKind,
    pub value: f64,
    pub fail_load: bool,
    pub loads: Vec<(u32, usize)>,
}

impl FakeAtlas {
    pub fn new(kind: AtlasKind, value: f64) -> Self {
        Self {
            kind,
            value,
            fail_load: false,
            loads: Vec::new(),
        }
    }

    pub fn broken(kind: AtlasKind) -> Self {
        Self {
            fail_load: true,
            ..Self::new(kind, 0.0)
        }
    }
}

impl Atlas for FakeAtlas {
    type Error = FakeError;

    fn kind(&self) -> AtlasKind {
        self.kind
    }

    fn load(&mut self, month: u32, nprofiles: usize) -> Result<(), FakeError> {
        self.loads.push((month, nprofiles));
        if self.fail_load {
            return Err(FakeError::Atlas);
        }
        Ok(())
    }

    fn emis_brdf(&mut self, batch: &ProfileBatch, channels: &[u16]) -> Result<Vec<f64>, FakeError> {
        Ok(vec![self.value; batch.len() * channels.len()])
    }
}

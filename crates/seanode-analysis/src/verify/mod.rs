//! Property verification for the type lattice
//!
//! [`LatticeVerifier`] draws random types with the QuickCheck generator
//! shared from `seanode_core::testing` and checks every law in
//! [`properties::LAWS`] on them.

pub mod properties;

pub use seanode_core::testing::{TypeCtx, TypeSpec};

use self::properties::{LatticeLaw, LAWS};
use quickcheck::{Arbitrary, Gen};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    /// Held on every sample.
    Holds,
    /// Failed; the counterexample is in the result.
    Violated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub property: String,
    pub description: String,
    pub status: PropertyStatus,
    pub cases_checked: usize,
    /// Printed inputs of the first failing case.
    pub counterexample: Option<Vec<String>>,
}

impl VerificationResult {
    pub fn holds(&self) -> bool {
        self.status == PropertyStatus::Holds
    }
}

pub struct LatticeVerifier {
    samples: usize,
    size: usize,
}

impl LatticeVerifier {
    pub fn new() -> Self {
        Self {
            samples: 200,
            size: 16,
        }
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// QuickCheck generator size; bounds the integer constants drawn.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Check every law.
    pub fn verify_all(&self) -> Vec<VerificationResult> {
        LAWS.iter().map(|l| self.verify_law(l)).collect()
    }

    /// Check one law by name.
    pub fn verify(&self, name: &str) -> Result<VerificationResult> {
        match properties::law(name) {
            Some(l) => Ok(self.verify_law(l)),
            None => bail!("unknown lattice law '{name}'"),
        }
    }

    fn verify_law(&self, law: &LatticeLaw) -> VerificationResult {
        let mut g = Gen::new(self.size);
        let mut cx = TypeCtx::new();
        let mut result = VerificationResult {
            property: law.name.to_string(),
            description: law.description.to_string(),
            status: PropertyStatus::Holds,
            cases_checked: 0,
            counterexample: None,
        };
        for _ in 0..self.samples {
            let specs: Vec<TypeSpec> = (0..law.arity).map(|_| TypeSpec::arbitrary(&mut g)).collect();
            let tys: Vec<_> = specs.iter().map(|s| s.build(&mut cx)).collect();
            result.cases_checked += 1;
            if !(law.check)(&mut cx, &tys) {
                let shown: Vec<String> = tys.iter().map(|&t| cx.types.str(t)).collect();
                warn!("Lattice law {} violated by {:?}", law.name, shown);
                result.status = PropertyStatus::Violated;
                result.counterexample = Some(shown);
                break;
            }
        }
        debug!(
            "Lattice law {}: {:?} after {} cases",
            law.name, result.status, result.cases_checked
        );
        result
    }
}

impl Default for LatticeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

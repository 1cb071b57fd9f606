// src/prediction/registry.rs
//
// Per-sport predictor cache shared by every session. Each sport trains at
// most once: concurrent first users block on the same OnceCell while one of
// them trains. The map lock is only held to fetch the cell.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::predictor::InjuryPredictor;
use crate::error::Result;
use crate::profiles::Sport;
use crate::types::PredictorConfig;

type Slot = Arc<OnceCell<Arc<InjuryPredictor>>>;

pub struct PredictorRegistry {
    config: PredictorConfig,
    slots: Mutex<HashMap<Sport, Slot>>,
    trainings: AtomicUsize,
}

impl PredictorRegistry {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            trainings: AtomicUsize::new(0),
        }
    }

    fn slot(&self, sport: Sport) -> Slot {
        self.slots.lock().entry(sport).or_default().clone()
    }

    /// Trained predictor for `sport`, training it on first use. A failed
    /// training leaves the slot empty so the next caller retries.
    pub fn acquire(&self, sport: Sport) -> Result<Arc<InjuryPredictor>> {
        let slot = self.slot(sport);
        if let Some(p) = slot.get() {
            return Ok(p.clone());
        }
        let predictor = slot.get_or_try_init(|| {
            self.trainings.fetch_add(1, Ordering::SeqCst);
            InjuryPredictor::train(sport, &self.config).map(Arc::new)
        })?;
        debug!("Predictor for {} ready", sport);
        Ok(predictor.clone())
    }

    /// Already-trained predictor, never trains.
    pub fn get(&self, sport: Sport) -> Option<Arc<InjuryPredictor>> {
        self.slots.lock().get(&sport).and_then(|s| s.get().cloned())
    }

    pub fn preload(&self, sports: &[Sport]) -> Result<()> {
        for &sport in sports {
            self.acquire(sport)?;
        }
        info!("Preloaded predictors: {:?}", sports);
        Ok(())
    }

    /// Number of trainings started so far.
    pub fn trainings(&self) -> usize {
        self.trainings.load(Ordering::SeqCst)
    }

    pub fn trained_sports(&self) -> Vec<Sport> {
        let slots = self.slots.lock();
        Sport::ALL
            .iter()
            .copied()
            .filter(|s| slots.get(s).is_some_and(|c| c.get().is_some()))
            .collect()
    }
}

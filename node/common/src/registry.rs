use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::MarketConfig;
use crate::error::{Error, Result};
use crate::types::{Job, JobId, JobSpec, JobState, MetricSnapshot, StateChange};

/// In-memory job store, kept in insertion order
pub struct JobRegistry {
    market: MarketConfig,
    clock: Arc<dyn Clock>,
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
}

impl JobRegistry {
    pub fn new(market: MarketConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            market,
            clock,
            jobs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a new job in PENDING
    pub fn create(&mut self, spec: JobSpec) -> Result<Job> {
        if spec.command.trim().is_empty() {
            return Err(Error::Validation("command is required".to_string()));
        }
        if !spec.threshold_price.is_finite() {
            return Err(Error::Validation(format!(
                "invalid threshold price: {}",
                spec.threshold_price
            )));
        }

        let id = match spec.id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::Validation("id must not be empty".to_string()));
            }
            Some(id) if self.index.contains_key(&id) => return Err(Error::DuplicateId(id)),
            Some(id) => id,
            None => self.generate_id(),
        };

        let now = self.clock.now();
        let job = Job {
            id: id.clone(),
            state: JobState::Pending,
            command: spec.command,
            description: spec.description,
            threshold_price: spec.threshold_price,
            start_timestamp: now,
            instance_type: self.market.instance_type.clone(),
            region: self.market.region.clone(),
            availability_zone: self.market.availability_zone.clone(),
            state_history: vec![StateChange {
                state: JobState::Pending,
                timestamp: now,
            }],
            training: Vec::new(),
            validation: Vec::new(),
            epoch: None,
            num_epochs: None,
        };

        self.index.insert(id.clone(), self.jobs.len());
        self.jobs.push(job.clone());

        info!("Added job {} (threshold ${})", id, job.threshold_price);
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Result<&Job> {
        self.index
            .get(id)
            .map(|&slot| &self.jobs[slot])
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Move a job to `state`. Any state may follow any other.
    pub fn transition(&mut self, id: &str, state: JobState) -> Result<&Job> {
        let now = self.clock.now();
        let job = self.get_mut(id)?;
        let previous = job.state;

        // history must not run backwards even if the clock does
        let timestamp = now.max(job.last_changed());
        job.state_history.push(StateChange { state, timestamp });
        job.state = state;

        info!("Job {}: {} -> {}", id, previous, state);
        Ok(&*job)
    }

    /// Mark a job IN_PROGRESS for a run of `num_epochs`
    pub fn start(&mut self, id: &str, num_epochs: u32) -> Result<&Job> {
        self.transition(id, JobState::InProgress)?;
        let job = self.get_mut(id)?;
        job.num_epochs = Some(num_epochs);
        Ok(&*job)
    }

    pub fn record_metric(
        &mut self,
        id: &str,
        epoch: u32,
        training: MetricSnapshot,
        validation: Option<MetricSnapshot>,
    ) -> Result<&Job> {
        let job = self.get_mut(id)?;
        job.epoch = Some(epoch);
        job.training.push(training);
        if let Some(validation) = validation {
            job.validation.push(validation);
        }

        debug!("Recorded metrics for job {} epoch {}", id, epoch);
        Ok(&*job)
    }

    pub fn list_by_state<P>(&self, predicate: P) -> Vec<&Job>
    where
        P: Fn(JobState) -> bool,
    {
        self.jobs.iter().filter(|job| predicate(job.state)).collect()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|job| job.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Job> {
        match self.index.get(id) {
            Some(&slot) => Ok(&mut self.jobs[slot]),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    fn generate_id(&self) -> JobId {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! The ordered provisioning sequence.
//!
//! Each step is bracketed by the step reporter and appends one result; the
//! run verdict is the conjunction of all of them. Steps whose outcome later
//! steps cannot do without abort the run, verification steps only record.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pmem_contracts::{
    BiosKnobApplier, PartitionRequest, PartitionStrategy, PmemToolkit, RebootSynchronizer,
    StepReporter, SutShell,
};
use pmem_types::{
    DiskHandle, DiskState, Evidence, MemoryKind, MountIdentifier, Namespace, PartitionSize, ProvisioningGoal,
    aggregate_capacity, bytes_to_pretty, region_free_equals_total, within_variance,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{ProvisioningError, Result};
use crate::goal::{self, GoalController};
use crate::ledger::Ledger;
use crate::namespace::{self, NamespaceManager};
use crate::partition::strategy_for;
use crate::profile::Profile;
use crate::reboot::RebootGate;
use crate::recorder::{StepRecorder, StepTicket, Stop};
use crate::report::RunReport;

const CLEAR_LOGS: &str = "clear OS error logs";
const APPLY_BIOS: &str = "apply BIOS knobs";
const REBOOT: &str = "reboot";
const INVENTORY: &str = "verify DIMM inventory against configured capacity";
const CLEAR_NAMESPACES: &str = "clear existing namespaces";
const DELETE_PCD: &str = "delete platform configuration data";
const REBOOT_AFTER_PCD: &str = "reboot after configuration data deletion";
const VERIFY_GOAL: &str = "verify goal";
const REBOOT_AFTER_GOAL: &str = "reboot after goal";
const VERIFY_RESOURCES: &str = "verify memory resources";
const VERIFY_REGIONS: &str = "verify region free capacity equals total";
const VERIFY_INTERLEAVE: &str = "verify interleave sets";
const LIST_UNUSED_REGIONS: &str = "list unused regions";
const CREATE_NAMESPACES: &str = "create one namespace per region";
const VERIFY_PRESENCE: &str = "verify namespace presence";
const VERIFY_NAMESPACE_CAPACITY: &str = "verify namespace capacity";
const LIST_NAMESPACES: &str = "list namespaces";
const LIST_DISKS: &str = "list provisioned disks";
const DELETE_EXISTING: &str = "delete pre-existing partitions";
const GPT_LABEL: &str = "create GPT label";
const DELETE_BEFORE_FULL: &str = "delete partitions before full-size stage";
const GPT_BEFORE_FULL: &str = "create GPT label before full-size stage";
const CREATE_FILESYSTEMS: &str = "create filesystems";
const CREATE_MOUNT_POINTS: &str = "create mount points";
const VERIFY_PARTITIONS: &str = "verify partitions";
const VERIFY_MOUNT_POINTS: &str = "verify mount points";
const RELEASE_MOUNTS: &str = "release mounts";
const DELETE_PARTITIONS: &str = "delete partitions";
const DESTROY_NAMESPACES: &str = "destroy namespaces";
const DELETE_LEDGER: &str = "delete partition ledger";

fn apply_goal_step(goal: &ProvisioningGoal) -> String {
    format!("apply goal {}", goal)
}

fn create_stage_step(size: PartitionSize) -> String {
    format!("create {} partitions", size)
}

fn disk_information_step(size: PartitionSize) -> String {
    format!("disk information after {} partitions", size)
}

/// Every step a full run records, in order
pub fn planned_steps(profile: &Profile) -> Vec<String> {
    let mut plan: Vec<String> = [
        CLEAR_LOGS,
        APPLY_BIOS,
        REBOOT,
        INVENTORY,
        CLEAR_NAMESPACES,
        DELETE_PCD,
        REBOOT_AFTER_PCD,
    ]
    .iter()
    .map(|step| step.to_string())
    .collect();
    plan.push(apply_goal_step(&profile.goal));
    plan.extend(
        [
            VERIFY_GOAL,
            REBOOT_AFTER_GOAL,
            VERIFY_RESOURCES,
            VERIFY_REGIONS,
            VERIFY_INTERLEAVE,
            LIST_UNUSED_REGIONS,
            CREATE_NAMESPACES,
            VERIFY_PRESENCE,
            VERIFY_NAMESPACE_CAPACITY,
            LIST_DISKS,
            DELETE_EXISTING,
            GPT_LABEL,
        ]
        .iter()
        .map(|step| step.to_string()),
    );
    for (stage, size) in profile.partition.sizes.iter().enumerate() {
        if size.is_full() && stage > 0 {
            plan.push(DELETE_BEFORE_FULL.to_string());
            plan.push(GPT_BEFORE_FULL.to_string());
        }
        plan.push(create_stage_step(*size));
        plan.push(disk_information_step(*size));
    }
    plan.extend(
        [
            CREATE_FILESYSTEMS,
            CREATE_MOUNT_POINTS,
            VERIFY_PARTITIONS,
            VERIFY_MOUNT_POINTS,
        ]
        .iter()
        .map(|step| step.to_string()),
    );
    if profile.run.teardown {
        plan.extend(teardown_steps().iter().map(|step| step.to_string()));
    }
    plan
}

fn verify_steps() -> [&'static str; 4] {
    [LIST_NAMESPACES, LIST_DISKS, VERIFY_PARTITIONS, VERIFY_MOUNT_POINTS]
}

fn teardown_steps() -> [&'static str; 4] {
    [RELEASE_MOUNTS, DELETE_PARTITIONS, DESTROY_NAMESPACES, DELETE_LEDGER]
}

/// External collaborators one run talks to
pub struct Collaborators {
    pub shell: Arc<dyn SutShell>,
    pub reboot: Arc<dyn RebootSynchronizer>,
    pub bios: Arc<dyn BiosKnobApplier>,
    pub reporter: Arc<dyn StepReporter>,
}

pub struct Orchestrator {
    profile: Profile,
    toolkit: Arc<dyn PmemToolkit>,
    strategy: Arc<dyn PartitionStrategy>,
    bios: Arc<dyn BiosKnobApplier>,
    goals: GoalController,
    namespaces: NamespaceManager,
    gate: RebootGate,
    recorder: StepRecorder,
    ledger: Ledger,
    disks: BTreeMap<String, DiskState>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    error: Option<String>,
}

impl Orchestrator {
    /// Resolve the platform toolkit and partition strategy for `profile`
    pub fn new(profile: Profile, collaborators: Collaborators) -> Self {
        let timeout = profile.command_timeout();
        let ledger = profile.ledger();
        let toolkit = pmem_sys::toolkit_for(profile.platform, collaborators.shell.clone(), timeout);
        let strategy = strategy_for(
            profile.platform,
            collaborators.shell,
            ledger.clone(),
            timeout,
        );

        Self {
            gate: RebootGate::new(collaborators.reboot, profile.reboot_timeout()),
            recorder: StepRecorder::new(collaborators.reporter, profile.run.policy),
            goals: GoalController::new(toolkit.clone()),
            namespaces: NamespaceManager::new(toolkit.clone()),
            bios: collaborators.bios,
            toolkit,
            strategy,
            ledger,
            disks: BTreeMap::new(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            error: None,
            profile,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Results so far, including a run that stopped early
    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            profile: self.profile.name.clone(),
            platform: self.profile.platform,
            started_at: self.started_at,
            finished_at: Some(Utc::now()),
            verdict: self.recorder.verdict(),
            boots: self.gate.boots(),
            steps: self.recorder.steps().to_vec(),
            disks: self.disks.clone(),
            error: self.error.clone(),
        }
    }

    /// Provision from BIOS knobs to verified mount points.
    ///
    /// A failed verification still yields `Ok` with a false verdict. `Err`
    /// means a step the rest of the run depends on failed; the partial
    /// results stay available through [`Orchestrator::report`].
    pub async fn run(&mut self) -> Result<RunReport> {
        info!("provisioning run {} with profile {}", self.run_id, self.profile.name);
        let plan = planned_steps(&self.profile);
        let outcome = self.provision().await;
        self.finish(outcome, &plan)
    }

    /// Check partitions and mounts left by an earlier run, using its ledger
    pub async fn verify(&mut self) -> Result<RunReport> {
        let plan: Vec<String> = verify_steps().iter().map(|step| step.to_string()).collect();
        let outcome = self.verify_existing().await;
        self.finish(outcome, &plan)
    }

    /// Undo a provisioning pass; every part succeeds when there is nothing to undo
    pub async fn teardown(&mut self) -> Result<RunReport> {
        let plan: Vec<String> = [LIST_NAMESPACES, LIST_DISKS]
            .into_iter()
            .chain(teardown_steps())
            .map(str::to_string)
            .collect();
        let outcome = self.teardown_existing().await;
        self.finish(outcome, &plan)
    }

    fn finish(&mut self, outcome: std::result::Result<(), Stop>, plan: &[String]) -> Result<RunReport> {
        match outcome {
            Ok(()) => Ok(self.report()),
            Err(Stop::Halted) => {
                warn!("run halted after step {}", self.recorder.steps().len());
                self.recorder.skip_remaining(plan);
                Ok(self.report())
            }
            Err(Stop::Abort(error)) => {
                self.recorder.skip_remaining(plan);
                self.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Start a step, tagged with the boot it runs on
    fn begin(&mut self, description: impl Into<String>) -> std::result::Result<StepTicket, Stop> {
        let ticket = self.recorder.start(description)?;
        Ok(match self.gate.boots() {
            0 => ticket,
            boot => ticket.on_boot(boot),
        })
    }

    /// Value of a step nothing later can do without; a failure ends the run
    fn required<T, E>(
        &mut self,
        step: StepTicket,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<(T, StepTicket), Stop>
    where
        E: Into<ProvisioningError>,
    {
        match outcome {
            Ok(value) => Ok((value, step)),
            Err(error) => Err(self.recorder.abort(step, error.into())),
        }
    }

    fn advance_disks(&mut self, disks: &[DiskHandle], next: DiskState) {
        for disk in disks {
            let state = self
                .disks
                .entry(disk.name.clone())
                .or_insert(DiskState::Unpartitioned);
            match state.advance(next) {
                Some(advanced) => *state = advanced,
                None => warn!("{}: cannot move from {:?} to {:?}", disk, state, next),
            }
        }
    }

    fn stage_request(&self, size: PartitionSize) -> PartitionRequest {
        PartitionRequest {
            filesystem: self.profile.partition.filesystem,
            access: self.profile.partition.access,
            size,
            table: self.profile.partition.convert_type,
        }
    }

    async fn provision(&mut self) -> std::result::Result<(), Stop> {
        let variance = self.profile.variance();
        let goal = self.profile.goal;

        let step = self.begin(CLEAR_LOGS)?;
        match self.toolkit.clear_error_logs().await {
            Ok(()) => self.recorder.pass(step, Evidence::None)?,
            Err(error) => self.recorder.fail(step, error)?,
        }

        let step = self.begin(APPLY_BIOS)?;
        let knob_file = self.profile.bios.knob_file.clone();
        let outcome = self.bios.apply_and_reboot(&knob_file).await;
        let ((), step) = self.required(step, outcome)?;
        self.recorder
            .pass(step, Evidence::Text(knob_file.display().to_string()))?;

        let step = self.begin(REBOOT)?;
        let outcome = self.gate.reboot().await;
        let (settled, step) = self.required(step, outcome)?;
        let step = step.on_boot(settled.boot());
        self.recorder.pass(step, Evidence::Text(format!("boot {}", settled.boot())))?;

        let step = self.begin(INVENTORY)?;
        let outcome = self.toolkit.list_dimms().await;
        let (dimms, step) = self.required(step, outcome)?;
        let observed = aggregate_capacity(&dimms);
        let configured = self.profile.configured_capacity();
        let comparison = Evidence::Comparison {
            observed,
            expected: configured,
            variance,
        };
        if dimms.is_empty() || !within_variance(observed, configured, variance) {
            let reason = format!(
                "{} healthy of {} DIMMs provide {}, configured {} with variance {}",
                dimms.iter().filter(|dimm| dimm.is_healthy()).count(),
                dimms.len(),
                bytes_to_pretty(&observed, false),
                bytes_to_pretty(&configured, false),
                variance
            );
            return Err(self.recorder.abort_with(
                step,
                comparison,
                ProvisioningError::FatalConfiguration { reason },
            ));
        }
        self.recorder.pass(step, comparison)?;

        let step = self.begin(CLEAR_NAMESPACES)?;
        let outcome = self.clear_namespaces().await;
        let (cleared, step) = self.required(step, outcome)?;
        self.recorder
            .pass(step, Evidence::Text(format!("{} namespaces destroyed", cleared)))?;

        let step = self.begin(DELETE_PCD)?;
        let outcome = self.namespaces.delete_pcd_metadata(settled).await;
        let (pending, step) = self.required(step, outcome)?;
        self.recorder.pass(step, Evidence::None)?;

        let step = self.begin(REBOOT_AFTER_PCD)?;
        let outcome = pending.settle(&mut self.gate).await;
        let (settled, step) = self.required(step, outcome)?;
        let step = step.on_boot(settled.boot());
        self.recorder.pass(step, Evidence::Text(format!("boot {}", settled.boot())))?;

        let step = self.begin(apply_goal_step(&goal))?;
        let outcome = self.goals.apply_goal(&goal, settled).await;
        let ((applied, pending), step) = self.required(step, outcome)?;
        self.recorder.pass(
            step,
            Evidence::list(applied.report.rows.iter().map(|row| {
                format!(
                    "socket {} {}: memory {} appdirect {}",
                    row.socket,
                    row.dimm_id,
                    bytes_to_pretty(&row.memory_size_bytes, false),
                    bytes_to_pretty(&row.app_direct_size_bytes, false)
                )
            })),
        )?;

        let step = self.begin(VERIFY_GOAL)?;
        let checks = goal::verify_goal(&applied, &dimms, variance);
        self.recorder
            .verdict_of(step, goal::all_passed(&checks), goal::evidence(&checks))?;

        let step = self.begin(REBOOT_AFTER_GOAL)?;
        let outcome = pending.settle(&mut self.gate).await;
        let (settled, step) = self.required(step, outcome)?;
        let step = step.on_boot(settled.boot());
        self.recorder.pass(step, Evidence::Text(format!("boot {}", settled.boot())))?;

        let step = self.begin(VERIFY_RESOURCES)?;
        match self.goals.memory_resources(&settled).await {
            Ok(resources) => {
                let checks = goal::verify_memory_resources(&goal, &resources);
                self.recorder
                    .verdict_of(step, goal::all_passed(&checks), goal::evidence(&checks))?;
            }
            Err(error) => self.recorder.fail(step, error)?,
        }

        let step = self.begin(VERIFY_REGIONS)?;
        let outcome = self.namespaces.list_regions(&settled).await;
        let (regions, step) = self.required(step, outcome)?;
        self.recorder.verdict_of(
            step,
            region_free_equals_total(&regions),
            Evidence::list(regions.iter().map(|region| {
                format!(
                    "{}: free {} of {}",
                    region.id,
                    bytes_to_pretty(&region.free_capacity, false),
                    bytes_to_pretty(&region.total_capacity, false)
                )
            })),
        )?;

        let step = self.begin(VERIFY_INTERLEAVE)?;
        let missing = namespace::regions_without_interleave_set(&regions);
        let verdict = !regions.is_empty() && missing.is_empty();
        self.recorder.verdict_of(step, verdict, Evidence::list(missing))?;

        let step = self.begin(LIST_UNUSED_REGIONS)?;
        let outcome = self.namespaces.list_unused_regions(&settled).await;
        let (mut unused, step) = self.required(step, outcome)?;
        self.recorder.verdict_of(
            step,
            !unused.is_empty(),
            Evidence::list(unused.iter().map(|region| region.id.clone())),
        )?;

        let step = self.begin(CREATE_NAMESPACES)?;
        let mode = self.profile.namespace.mode;
        let outcome = self
            .namespaces
            .create_per_region(&settled, &mut unused, mode)
            .await;
        let (created, step) = self.required(step, outcome)?;
        self.recorder.pass(
            step,
            Evidence::list(created.iter().zip(&unused).map(|(namespace, region)| {
                format!(
                    "{} ({}) {} on {}, {} left",
                    namespace.id,
                    namespace.block_device,
                    bytes_to_pretty(&namespace.capacity, false),
                    region.id,
                    bytes_to_pretty(&region.free_capacity, false)
                )
            })),
        )?;

        let step = self.begin(VERIFY_PRESENCE)?;
        let outcome = self.namespaces.list_namespaces().await;
        let (listed, step) = self.required(step, outcome)?;
        self.recorder.verdict_of(
            step,
            namespace::verify_presence(&listed, unused.len()),
            Evidence::Comparison {
                observed: listed.len() as u64,
                expected: unused.len() as u64,
                variance: 0.0,
            },
        )?;

        let step = self.begin(VERIFY_NAMESPACE_CAPACITY)?;
        let expected = goal.expected_bytes(MemoryKind::Persistent, configured);
        let (total, verdict) = namespace::verify_capacity(&listed, expected, variance);
        self.recorder.verdict_of(
            step,
            verdict,
            Evidence::Comparison {
                observed: total,
                expected,
                variance,
            },
        )?;

        let disks = self.provisioned_disks(&listed).await?;
        self.partition(&disks).await?;

        if self.profile.run.teardown {
            self.teardown_disks(&disks).await?;
        }
        Ok(())
    }

    async fn clear_namespaces(&self) -> Result<usize> {
        self.strategy.release_mounts().await?;
        self.namespaces.clear_if_present().await
    }

    /// Disks backing `namespaces`; none at all ends the run
    async fn provisioned_disks(
        &mut self,
        namespaces: &[Namespace],
    ) -> std::result::Result<Vec<DiskHandle>, Stop> {
        let step = self.begin(LIST_DISKS)?;
        let outcome = self.strategy.list_provisioned_disks(namespaces).await;
        let (disks, step) = self.required(step, outcome)?;
        if disks.is_empty() {
            return Err(self.recorder.abort(
                step,
                ProvisioningError::PreconditionUnsatisfied {
                    step: LIST_DISKS.to_string(),
                    reason: format!("no disks behind {} namespaces", namespaces.len()),
                },
            ));
        }
        self.recorder
            .pass(step, Evidence::list(disks.iter().map(|disk| disk.name.clone())))?;
        Ok(disks)
    }

    async fn partition(&mut self, disks: &[DiskHandle]) -> std::result::Result<(), Stop> {
        let step = self.begin(DELETE_EXISTING)?;
        let outcome = self.strategy.delete_partitions(disks).await;
        let ((), step) = self.required(step, outcome)?;
        self.advance_disks(disks, DiskState::Unpartitioned);
        self.recorder.pass(step, Evidence::None)?;

        let step = self.begin(GPT_LABEL)?;
        let outcome = self.strategy.create_gpt_label(disks).await;
        let ((), step) = self.required(step, outcome)?;
        self.advance_disks(disks, DiskState::GptLabeled);
        self.recorder.pass(step, Evidence::None)?;

        let sizes = self.profile.partition.sizes.clone();
        for (stage, size) in sizes.into_iter().enumerate() {
            if size.is_full() && stage > 0 {
                let step = self.begin(DELETE_BEFORE_FULL)?;
                let outcome = self.strategy.delete_partitions(disks).await;
                let ((), step) = self.required(step, outcome)?;
                self.advance_disks(disks, DiskState::Unpartitioned);
                self.recorder.pass(step, Evidence::None)?;

                let step = self.begin(GPT_BEFORE_FULL)?;
                let outcome = self.strategy.create_gpt_label(disks).await;
                let ((), step) = self.required(step, outcome)?;
                self.advance_disks(disks, DiskState::GptLabeled);
                self.recorder.pass(step, Evidence::None)?;
            }

            let step = self.begin(create_stage_step(size))?;
            let request = self.stage_request(size);
            let outcome = self.strategy.create_partition(disks, &request).await;
            let (partitions, step) = self.required(step, outcome)?;
            self.advance_disks(disks, DiskState::Partitioned);
            self.recorder.pass(
                step,
                Evidence::list(
                    partitions
                        .iter()
                        .map(|partition| format!("{} -> {}", partition.owner, partition.device)),
                ),
            )?;

            let step = self.begin(disk_information_step(size))?;
            match self.strategy.disk_information(disks).await {
                Ok(information) => self.recorder.pass(step, Evidence::List(information))?,
                Err(error) => self.recorder.fail(step, error)?,
            }
        }

        let filesystem = self.profile.partition.filesystem;
        let access = self.profile.partition.access;

        let step = self.begin(CREATE_FILESYSTEMS)?;
        let outcome = self.strategy.create_filesystem(disks, filesystem).await;
        let ((), step) = self.required(step, outcome)?;
        self.advance_disks(disks, DiskState::FilesystemApplied);
        self.recorder
            .pass(step, Evidence::Text(filesystem.to_string()))?;

        let step = self.begin(CREATE_MOUNT_POINTS)?;
        let outcome = self
            .strategy
            .create_mount_points(disks, filesystem, access)
            .await;
        let (mounts, step) = self.required(step, outcome)?;
        self.advance_disks(disks, DiskState::Mounted);
        self.recorder.pass(
            step,
            Evidence::list(mounts.iter().map(|mount| mount.to_ledger_entry())),
        )?;

        let partitions_ok = self.verify_partitions(disks, Some(mounts.as_slice())).await?;
        let mounts_ok = self.verify_mount_points(disks).await?;
        if partitions_ok && mounts_ok {
            self.advance_disks(disks, DiskState::Verified);
        }
        Ok(())
    }

    async fn verify_partitions(
        &mut self,
        disks: &[DiskHandle],
        expected: Option<&[MountIdentifier]>,
    ) -> std::result::Result<bool, Stop> {
        let step = self.begin(VERIFY_PARTITIONS)?;
        match self.strategy.verify_partitions(disks, expected).await {
            Ok(verdict) => {
                let evidence = match self.ledger.read() {
                    Ok(entries) => Evidence::List(entries),
                    Err(error) => Evidence::Text(error.to_string()),
                };
                self.recorder.verdict_of(step, verdict, evidence)?;
                Ok(verdict)
            }
            Err(error) => {
                self.recorder.fail(step, error)?;
                Ok(false)
            }
        }
    }

    async fn verify_mount_points(&mut self, disks: &[DiskHandle]) -> std::result::Result<bool, Stop> {
        let step = self.begin(VERIFY_MOUNT_POINTS)?;
        match self.strategy.verify_mount_points(disks).await {
            Ok(verdict) => {
                self.recorder.verdict_of(step, verdict, Evidence::Verdict(verdict))?;
                Ok(verdict)
            }
            Err(error) => {
                self.recorder.fail(step, error)?;
                Ok(false)
            }
        }
    }

    async fn listed_disks(&mut self) -> std::result::Result<Vec<DiskHandle>, Stop> {
        let step = self.begin(LIST_NAMESPACES)?;
        let outcome = self.namespaces.list_namespaces().await;
        let (namespaces, step) = self.required(step, outcome)?;
        self.recorder.pass(
            step,
            Evidence::list(namespaces.iter().map(|namespace| namespace.id.clone())),
        )?;

        let step = self.begin(LIST_DISKS)?;
        let outcome = self.strategy.list_provisioned_disks(&namespaces).await;
        let (disks, step) = self.required(step, outcome)?;
        self.recorder
            .pass(step, Evidence::list(disks.iter().map(|disk| disk.name.clone())))?;
        Ok(disks)
    }

    async fn verify_existing(&mut self) -> std::result::Result<(), Stop> {
        let disks = self.listed_disks().await?;
        self.verify_partitions(&disks, None).await?;
        self.verify_mount_points(&disks).await?;
        Ok(())
    }

    async fn teardown_existing(&mut self) -> std::result::Result<(), Stop> {
        let disks = self.listed_disks().await?;
        self.teardown_disks(&disks).await
    }

    /// Cleanup after a possibly partial pass; failures are recorded, never fatal
    async fn teardown_disks(&mut self, disks: &[DiskHandle]) -> std::result::Result<(), Stop> {
        let step = self.begin(RELEASE_MOUNTS)?;
        match self.strategy.release_mounts().await {
            Ok(()) => self.recorder.pass(step, Evidence::None)?,
            Err(error) => self.recorder.fail(step, error)?,
        }

        let step = self.begin(DELETE_PARTITIONS)?;
        match self.strategy.delete_partitions(disks).await {
            Ok(()) => {
                self.advance_disks(disks, DiskState::Unpartitioned);
                self.recorder.pass(step, Evidence::None)?
            }
            Err(error) => self.recorder.fail(step, error)?,
        }

        let step = self.begin(DESTROY_NAMESPACES)?;
        match self.namespaces.clear_if_present().await {
            Ok(count) => self
                .recorder
                .pass(step, Evidence::Text(format!("{} namespaces destroyed", count)))?,
            Err(error) => self.recorder.fail(step, error)?,
        }

        let step = self.begin(DELETE_LEDGER)?;
        match self.ledger.delete() {
            Ok(()) => self
                .recorder
                .pass(step, Evidence::Text(self.ledger.path().display().to_string()))?,
            Err(error) => self.recorder.fail(step, error)?,
        }
        Ok(())
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! In-memory system under test.
//!
//! Answers the ipmctl, ndctl, PowerShell, parted, diskpart and mount
//! commands the pipeline issues, with the same refusals the real tools
//! have: goals and configuration wipes only take effect on reboot, a goal
//! cannot be created while namespaces exist, busy partitions cannot be
//! removed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{CommandOutput, ContractError, SutShell};
use pmem_types::{GIB, MIB, Platform};
use serde_json::{Value, json};

const SYSTEM_DISK_BYTES: u64 = 476 * GIB;
const FIRST_WINDOWS_DISK: u32 = 9;
const ISET_BASE: i64 = 2_506_113_243_053_544_244;

#[derive(Debug, Clone)]
pub struct SimDimm {
    pub handle: u16,
    pub capacity: u64,
    pub healthy: bool,
}

impl SimDimm {
    pub fn new(handle: u16, capacity: u64) -> Self {
        Self {
            handle,
            capacity,
            healthy: true,
        }
    }

    pub fn failed(handle: u16, capacity: u64) -> Self {
        Self {
            healthy: false,
            ..Self::new(handle, capacity)
        }
    }

    fn socket(&self) -> u32 {
        u32::from((self.handle >> 12) & 0xF)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Split {
    persistent: u64,
    volatile: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staged {
    Goal(Split),
    PcdWipe,
}

#[derive(Debug, Clone)]
struct SimRegion {
    socket: u32,
    size: u64,
    available: u64,
}

#[derive(Debug, Clone)]
struct SimNamespace {
    socket: u32,
    size: u64,
    mode: String,
    disk: String,
}

#[derive(Debug, Clone)]
struct SimPartition {
    number: u32,
    start: u64,
    end: u64,
    filesystem: Option<String>,
    letter: Option<char>,
}

impl SimPartition {
    fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone)]
struct SimDisk {
    size: u64,
    label: Option<&'static str>,
    partitions: Vec<SimPartition>,
}

impl SimDisk {
    fn next_number(&self) -> u32 {
        self.partitions.iter().map(|p| p.number).max().unwrap_or(0) + 1
    }

    fn used_end(&self) -> Option<u64> {
        self.partitions.iter().map(|p| p.end).max()
    }
}

#[derive(Debug, Clone)]
struct SimMount {
    source: String,
    target: String,
    fstype: String,
    dax: bool,
}

#[derive(Debug)]
struct Failure {
    status: i32,
    stdout: String,
    stderr: String,
}

fn fail(status: i32, stderr: impl Into<String>) -> Failure {
    Failure {
        status,
        stdout: String::new(),
        stderr: stderr.into(),
    }
}

type Reply = Result<String, Failure>;

fn gib(bytes: u64) -> String {
    format!("{:.3} GiB", bytes as f64 / GIB as f64)
}

fn percent(bytes: u64, share: u64) -> u64 {
    (bytes as u128 * share as u128 / 100) as u64
}

fn partition_device(disk: &str, number: u32) -> String {
    if disk.ends_with(|c: char| c.is_ascii_digit()) {
        format!("{}p{}", disk, number)
    } else {
        format!("{}{}", disk, number)
    }
}

/// ConvertTo-Json prints nothing for an empty pipeline and a bare object for one item
fn convert_to_json(items: Vec<Value>) -> String {
    match items.len() {
        0 => String::new(),
        1 => serde_json::to_string_pretty(&items[0]).unwrap_or_default(),
        _ => serde_json::to_string_pretty(&Value::Array(items)).unwrap_or_default(),
    }
}

fn diskpart_size(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{} GB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{} B", bytes)
    }
}

struct State {
    platform: Platform,
    dimms: Vec<SimDimm>,
    active: Option<Split>,
    staged: Option<Staged>,
    regions: Vec<SimRegion>,
    namespaces: Vec<SimNamespace>,
    disks: BTreeMap<String, SimDisk>,
    mounts: Vec<SimMount>,
    directories: BTreeSet<String>,
    fstab: Vec<String>,
    files: BTreeMap<String, String>,
    commands: Vec<String>,
    boots: u64,
    next_disk_number: u32,
    app_direct_scale: f64,
    unhealthy_volumes: bool,
}

pub struct SimulatedSut {
    state: Mutex<State>,
}

impl SimulatedSut {
    fn with_platform(platform: Platform, dimms: Vec<SimDimm>) -> Self {
        Self {
            state: Mutex::new(State {
                platform,
                dimms,
                active: None,
                staged: None,
                regions: Vec::new(),
                namespaces: Vec::new(),
                disks: BTreeMap::new(),
                mounts: Vec::new(),
                directories: BTreeSet::new(),
                fstab: Vec::new(),
                files: BTreeMap::new(),
                commands: Vec::new(),
                boots: 0,
                next_disk_number: FIRST_WINDOWS_DISK,
                app_direct_scale: 1.0,
                unhealthy_volumes: false,
            }),
        }
    }

    pub fn linux(dimms: Vec<SimDimm>) -> Self {
        Self::with_platform(Platform::Linux, dimms)
    }

    pub fn windows(dimms: Vec<SimDimm>) -> Self {
        Self::with_platform(Platform::Windows, dimms)
    }

    /// Start from an earlier AppDirect provisioning: committed goal and one
    /// namespace per region.
    pub fn with_stale_namespaces(self) -> Self {
        {
            let mut state = self.lock();
            state.commit(Split {
                persistent: 100,
                volatile: 0,
            });
            let sockets: Vec<u32> = state.regions.iter().map(|r| r.socket).collect();
            for socket in sockets {
                let _ = state.carve(socket, "fsdax");
            }
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scale the AppDirect capacity `ipmctl show -memoryresources` reports
    pub fn skew_app_direct(&self, scale: f64) {
        self.lock().app_direct_scale = scale;
    }

    /// `detail disk` reports every pmem volume as failed
    pub fn fail_volumes(&self) {
        self.lock().unhealthy_volumes = true;
    }

    pub fn reboot(&self) {
        self.lock().reboot();
    }

    pub fn boots(&self) -> u64 {
        self.lock().boots
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|command| command.starts_with(prefix))
            .count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn namespace_count(&self) -> usize {
        self.lock().namespaces.len()
    }

    pub fn disk_names(&self) -> Vec<String> {
        self.lock().disks.keys().cloned().collect()
    }

    pub fn label(&self, disk: &str) -> Option<String> {
        self.lock()
            .disks
            .get(disk)
            .and_then(|d| d.label.map(str::to_string))
    }

    pub fn partition_sizes(&self, disk: &str) -> Vec<u64> {
        self.lock()
            .disks
            .get(disk)
            .map(|d| d.partitions.iter().map(SimPartition::size).collect())
            .unwrap_or_default()
    }

    pub fn disk_size(&self, disk: &str) -> u64 {
        self.lock().disks.get(disk).map(|d| d.size).unwrap_or(0)
    }

    pub fn filesystems(&self, disk: &str) -> Vec<Option<String>> {
        self.lock()
            .disks
            .get(disk)
            .map(|d| d.partitions.iter().map(|p| p.filesystem.clone()).collect())
            .unwrap_or_default()
    }

    pub fn letters(&self, disk: &str) -> Vec<char> {
        self.lock()
            .disks
            .get(disk)
            .map(|d| d.partitions.iter().filter_map(|p| p.letter).collect())
            .unwrap_or_default()
    }

    /// (source, target, dax) of every provisioned mount
    pub fn mounts(&self) -> Vec<(String, String, bool)> {
        self.lock()
            .mounts
            .iter()
            .map(|m| (m.source.clone(), m.target.clone(), m.dax))
            .collect()
    }

    pub fn fstab(&self) -> Vec<String> {
        self.lock().fstab.clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }
}

#[async_trait]
impl SutShell for SimulatedSut {
    async fn exec(&self, command: &str, _timeout: Duration) -> Result<CommandOutput, ContractError> {
        let mut state = self.lock();
        state.commands.push(command.to_string());
        let output = match state.execute(command) {
            Ok(stdout) => CommandOutput {
                command: command.to_string(),
                stdout,
                stderr: String::new(),
                status: Some(0),
            },
            Err(failure) => CommandOutput {
                command: command.to_string(),
                stdout: failure.stdout,
                stderr: failure.stderr,
                status: Some(failure.status),
            },
        };
        Ok(output)
    }

    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        _timeout: Duration,
    ) -> Result<(), ContractError> {
        let mut state = self.lock();
        state.commands.push(format!("write {}", path));
        state.files.insert(path.to_string(), contents.to_string());
        Ok(())
    }
}

impl State {
    fn physical(&self) -> u64 {
        self.dimms
            .iter()
            .filter(|d| d.healthy)
            .map(|d| d.capacity)
            .sum()
    }

    fn sockets(&self) -> BTreeSet<u32> {
        self.dimms
            .iter()
            .filter(|d| d.healthy)
            .map(SimDimm::socket)
            .collect()
    }

    fn commit(&mut self, split: Split) {
        self.active = Some(split);
        self.regions = self
            .sockets()
            .into_iter()
            .filter_map(|socket| {
                let capacity: u64 = self
                    .dimms
                    .iter()
                    .filter(|d| d.healthy && d.socket() == socket)
                    .map(|d| d.capacity)
                    .sum();
                let size = percent(capacity, split.persistent);
                (size > 0).then_some(SimRegion {
                    socket,
                    size,
                    available: size,
                })
            })
            .collect();
    }

    fn reboot(&mut self) {
        self.boots += 1;
        match self.staged.take() {
            Some(Staged::Goal(split)) => self.commit(split),
            Some(Staged::PcdWipe) => {
                self.active = None;
                self.regions.clear();
            }
            None => {}
        }

        self.mounts.clear();
        for line in self.fstab.clone() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if let [source, target, fstype, options, ..] = fields.as_slice() {
                let formatted = self.find_partition(source.trim_start_matches("/dev/")).is_some();
                if formatted && self.directories.contains(*target) {
                    self.mounts.push(SimMount {
                        source: source.to_string(),
                        target: target.to_string(),
                        fstype: fstype.to_string(),
                        dax: options.split(',').any(|o| o == "dax"),
                    });
                }
            }
        }
    }

    fn execute(&mut self, command: &str) -> Reply {
        if command.starts_with("powershell.exe ") {
            return self.powershell(command);
        }
        if let Some(entry) = command
            .strip_prefix("echo '")
            .and_then(|rest| rest.strip_suffix("' >> /etc/fstab"))
        {
            self.fstab.push(entry.to_string());
            return Ok(String::new());
        }

        let words: Vec<&str> = command.split_whitespace().collect();
        match words.as_slice() {
            ["dmesg", "-C"] | ["journalctl", "--rotate"] | ["journalctl", "--vacuum-time=1s"] => {
                Ok(String::new())
            }
            ["wevtutil", "cl", _] => Ok(String::new()),
            ["ipmctl", "show", "-dimm"] => Ok(self.dimm_table()),
            ["ipmctl", "create", "-f", "-goal", args @ ..] => self.create_goal(args),
            ["ipmctl", "show", "-goal"] => Ok(match self.staged {
                Some(Staged::Goal(split)) => self.goal_table(split),
                _ => "There are no goal configs defined in the system.\n".to_string(),
            }),
            ["ipmctl", "show", "-memoryresources"] => Ok(self.memory_resources()),
            ["ipmctl", "show", "-region"] => Ok(self.region_table()),
            ["ipmctl", "delete", "-f", "-dimm", "-pcd"] => self.delete_pcd(),
            ["ndctl", "list", "--regions"] => Ok(self.ndctl_regions()),
            ["ndctl", "list", "--namespaces"] => Ok(self.ndctl_namespaces()),
            ["ndctl", "destroy-namespace", "all", "-f"] => self.destroy_namespaces(),
            ["ndctl", "create-namespace", mode, region] => {
                let (mode, region): (&str, &str) = (*mode, *region);
                let mode = mode.strip_prefix("--mode=").unwrap_or(mode);
                let socket = region
                    .strip_prefix("--region=region")
                    .and_then(|index| index.parse().ok())
                    .ok_or_else(|| fail(1, format!("unknown region {}", region)))?;
                let created = self.carve(socket, mode)?;
                Ok(serde_json::to_string_pretty(&self.ndctl_namespace(&created)).unwrap_or_default())
            }
            ["parted", "-s", disk, "mklabel", label] => self.mklabel(disk, label),
            ["parted", "-s", disk, "unit", unit, "print"] => self.parted_print(disk, unit),
            ["parted", "-s", disk, "rm", number] => self.parted_rm(disk, number),
            ["parted", "-s", "-a", "optimal", disk, "mkpart", "primary", _, "0%", "100%"] => {
                self.mkpart_full(disk)
            }
            ["parted", "-s", "-a", "optimal", disk, "unit", "MiB", "mkpart", "primary", _, start, end] => {
                self.mkpart_sized(disk, start, end)
            }
            ["lsblk", "-ln", "-o", "NAME,TYPE"] => Ok(self.lsblk()),
            [mkfs, _, device] if mkfs.starts_with("mkfs.") => {
                let filesystem = mkfs.trim_start_matches("mkfs.").to_string();
                self.mkfs(device.trim_start_matches("/dev/"), filesystem)
            }
            ["mkdir", "-p", path] => {
                self.directories.insert(path.to_string());
                Ok(String::new())
            }
            ["mount"] => Ok(self.mount_table()),
            ["mount", "-o", "dax", device, target] => self.mount(device, target, true),
            ["mount", device, target] => self.mount(device, target, false),
            ["umount", target] => {
                let before = self.mounts.len();
                self.mounts.retain(|m| m.target != *target && m.source != *target);
                if self.mounts.len() == before {
                    Err(fail(32, format!("umount: {}: not mounted.", target)))
                } else {
                    Ok(String::new())
                }
            }
            ["sed", "-i", _, "/etc/fstab"] => {
                self.fstab.retain(|line| !line.contains("/mnt/QM-"));
                Ok(String::new())
            }
            ["diskpart", "/s", script] => self.diskpart(script),
            ["format", letter, filesystem, "/Q", "/Y", rest @ ..] => {
                let letter = letter.trim_end_matches(':').chars().next().unwrap_or(' ');
                let filesystem = filesystem.trim_start_matches("/FS:").to_string();
                let _dax = rest.contains(&"/DAX");
                self.format(letter, filesystem)
            }
            _ => Err(fail(127, format!("{}: command not found", words.first().unwrap_or(&"")))),
        }
    }

    fn dimm_table(&self) -> String {
        let mut out = String::from(
            " DimmID | Capacity    | LockState | HealthState | FWVersion\n\
             ===============================================================\n",
        );
        for dimm in &self.dimms {
            out.push_str(&format!(
                " 0x{:04x} | {} | Disabled  | {} | 01.02.00.5435\n",
                dimm.handle,
                gib(dimm.capacity),
                if dimm.healthy { "Healthy" } else { "Critical failure" }
            ));
        }
        out
    }

    fn goal_table(&self, split: Split) -> String {
        let mut out = String::from(
            "The following configuration will be applied:\n \
             SocketID | DimmID | MemorySize | AppDirect1Size | AppDirect2Size\n\
             ==================================================================\n",
        );
        for dimm in self.dimms.iter().filter(|d| d.healthy) {
            out.push_str(&format!(
                " 0x{:04x}   | 0x{:04x} | {} | {} | 0.000 GiB\n",
                dimm.socket(),
                dimm.handle,
                gib(percent(dimm.capacity, split.volatile)),
                gib(percent(dimm.capacity, split.persistent))
            ));
        }
        out
    }

    fn create_goal(&mut self, args: &[&str]) -> Reply {
        if !self.namespaces.is_empty() {
            return Err(fail(
                1,
                "Error: Failed to create goal. Namespaces exist on the requested DIMMs.",
            ));
        }
        if self.staged == Some(Staged::PcdWipe) {
            return Err(fail(
                1,
                "Error: Platform configuration data was deleted. A reboot is required first.",
            ));
        }

        let mut volatile = 0;
        let mut reserved = 0;
        let mut app_direct = false;
        for arg in args {
            match arg.split_once('=') {
                Some(("MemoryMode", value)) => volatile = value.parse().unwrap_or(0),
                Some(("Reserved", value)) => reserved = value.parse().unwrap_or(0),
                Some(("PersistentMemoryType", "AppDirect")) => app_direct = true,
                _ => return Err(fail(1, format!("Error: invalid goal property {}", arg))),
            }
        }
        let persistent = if app_direct { 100 - volatile - reserved } else { 0 };
        let split = Split {
            persistent,
            volatile,
        };
        self.staged = Some(Staged::Goal(split));

        let mut out = self.goal_table(split);
        out.push_str("Created following region configuration goal\n");
        out.push_str("A reboot is required to process new memory allocation goals.\n");
        Ok(out)
    }

    fn memory_resources(&self) -> String {
        let physical = self.physical();
        let (volatile, app_direct) = match self.active {
            Some(split) => (
                percent(physical, split.volatile),
                (percent(physical, split.persistent) as f64 * self.app_direct_scale) as u64,
            ),
            None => (0, 0),
        };
        let inaccessible = physical.saturating_sub(volatile + app_direct);
        let ddr = 192 * GIB;
        format!(
            " MemoryType   | DDR         | PMemModule   | Total\n\
             ==========================================================\n \
             Volatile     | {ddr} | {volatile} | {volatile_total}\n \
             AppDirect    | -           | {app_direct} | {app_direct}\n \
             Cache        | 0.000 GiB   | -            | 0.000 GiB\n \
             Inaccessible | -           | {inaccessible} | {inaccessible}\n \
             Physical     | {ddr} | {physical} | {physical_total}\n",
            ddr = gib(ddr),
            volatile = gib(volatile),
            volatile_total = gib(ddr + volatile),
            app_direct = gib(app_direct),
            inaccessible = gib(inaccessible),
            physical = gib(physical),
            physical_total = gib(ddr + physical),
        )
    }

    fn region_table(&self) -> String {
        if self.regions.is_empty() {
            return "There are no Regions defined in the system.\n".to_string();
        }
        let mut out = String::from(
            " RegionID | SocketID | ISetID             | PersistentMemoryType | Capacity    | FreeCapacity | HealthState\n\
             ==========================================================================================================\n",
        );
        for (index, region) in self.regions.iter().enumerate() {
            out.push_str(&format!(
                " 0x{:04x}   | 0x{:04x}   | 0x{:016x} | AppDirect | {} | {} | Healthy\n",
                index + 1,
                region.socket,
                ISET_BASE + i64::from(region.socket),
                gib(region.size),
                gib(region.available)
            ));
        }
        out
    }

    fn delete_pcd(&mut self) -> Reply {
        if !self.namespaces.is_empty() {
            return Err(fail(
                1,
                "Error: Unable to delete configuration data while namespaces exist.",
            ));
        }
        self.staged = Some(Staged::PcdWipe);
        Ok("Delete PCD data on all DIMMs: Success\n".to_string())
    }

    fn ndctl_regions(&self) -> String {
        let regions: Vec<Value> = self
            .regions
            .iter()
            .rev()
            .map(|region| {
                json!({
                    "dev": format!("region{}", region.socket),
                    "size": region.size,
                    "align": 16777216,
                    "available_size": region.available,
                    "max_available_extent": region.available,
                    "type": "pmem",
                    "numa_node": region.socket,
                    "iset_id": ISET_BASE + i64::from(region.socket),
                    "persistence_domain": "memory_controller",
                })
            })
            .collect();
        if regions.is_empty() {
            String::new()
        } else {
            serde_json::to_string_pretty(&Value::Array(regions)).unwrap_or_default()
        }
    }

    fn ndctl_namespace(&self, namespace: &SimNamespace) -> Value {
        json!({
            "dev": format!("namespace{}.0", namespace.socket),
            "mode": namespace.mode,
            "map": "dev",
            "size": namespace.size,
            "uuid": format!("5f2c1b7e-0d3a-4e5f-9a8b-00000000000{}", namespace.socket),
            "sector_size": 512,
            "align": 2097152,
            "blockdev": namespace.disk,
        })
    }

    fn ndctl_namespaces(&self) -> String {
        let namespaces: Vec<Value> = self
            .namespaces
            .iter()
            .map(|namespace| self.ndctl_namespace(namespace))
            .collect();
        if namespaces.is_empty() {
            String::new()
        } else {
            serde_json::to_string_pretty(&Value::Array(namespaces)).unwrap_or_default()
        }
    }

    /// One namespace over all free capacity of the region on `socket`
    fn carve(&mut self, socket: u32, mode: &str) -> Result<SimNamespace, Failure> {
        let platform = self.platform;
        let disk_number = self.next_disk_number;
        let region = self
            .regions
            .iter_mut()
            .find(|region| region.socket == socket)
            .ok_or_else(|| fail(1, format!("region{} not found", socket)))?;
        if region.available == 0 {
            return Err(fail(1, "failed to create namespace: No space left on device"));
        }

        // fsdax keeps its page map on the media itself
        let size = match platform {
            Platform::Linux => region.available - region.available / 64,
            _ => region.available,
        };
        region.available = 0;

        let disk = match platform {
            Platform::Linux => format!("pmem{}", socket),
            _ => {
                self.next_disk_number += 1;
                disk_number.to_string()
            }
        };
        let namespace = SimNamespace {
            socket,
            size,
            mode: mode.to_string(),
            disk: disk.clone(),
        };
        self.namespaces.push(namespace.clone());
        self.disks.insert(
            disk,
            SimDisk {
                size,
                label: None,
                partitions: Vec::new(),
            },
        );
        Ok(namespace)
    }

    fn destroy_namespaces(&mut self) -> Reply {
        for namespace in &self.namespaces {
            let prefix = format!("/dev/{}", namespace.disk);
            if self.mounts.iter().any(|m| m.source.starts_with(&prefix)) {
                return Err(fail(
                    1,
                    format!(
                        "destroy namespace{}.0 failed: Device or resource busy",
                        namespace.socket
                    ),
                ));
            }
        }
        self.remove_namespaces();
        Ok(String::new())
    }

    fn remove_namespaces(&mut self) {
        for namespace in std::mem::take(&mut self.namespaces) {
            self.disks.remove(&namespace.disk);
        }
        for region in &mut self.regions {
            region.available = region.size;
        }
    }

    fn disk_mut(&mut self, path: &str) -> Result<&mut SimDisk, Failure> {
        let name = path.trim_start_matches("/dev/");
        self.disks.get_mut(name).ok_or_else(|| {
            fail(
                1,
                format!("Error: Could not stat device {} - No such file or directory.", path),
            )
        })
    }

    fn is_mounted(&self, device: &str) -> bool {
        let source = format!("/dev/{}", device);
        self.mounts.iter().any(|m| m.source == source)
    }

    fn find_partition(&self, device: &str) -> Option<(&str, &SimPartition)> {
        self.disks.iter().find_map(|(name, disk)| {
            disk.partitions
                .iter()
                .find(|p| partition_device(name, p.number) == device && p.filesystem.is_some())
                .map(|p| (name.as_str(), p))
        })
    }

    fn mklabel(&mut self, path: &str, label: &str) -> Reply {
        let name = path.trim_start_matches("/dev/").to_string();
        let busy = self
            .disks
            .get(&name)
            .map(|disk| {
                disk.partitions
                    .iter()
                    .any(|p| self.is_mounted(&partition_device(&name, p.number)))
            })
            .unwrap_or(false);
        if busy {
            return Err(fail(1, format!("Error: Partition(s) on {} are being used.", path)));
        }
        let label = match label {
            "gpt" => "gpt",
            "msdos" => "msdos",
            other => return Err(fail(1, format!("Error: unknown label type {}", other))),
        };
        let disk = self.disk_mut(path)?;
        disk.label = Some(label);
        disk.partitions.clear();
        Ok(String::new())
    }

    fn parted_print(&mut self, path: &str, unit: &str) -> Reply {
        let disk = self.disk_mut(path)?.clone();
        let render = |bytes: u64| match unit {
            "GB" => format!("{:.1}GB", bytes as f64 / 1e9),
            _ => format!("{}B", bytes),
        };

        let mut out = format!(
            "Model: NVDIMM Device (pmem)\nDisk {}: {}\nSector size (logical/physical): 512B/4096B\n",
            path,
            render(disk.size)
        );
        let Some(label) = disk.label else {
            out.push_str("Partition Table: unknown\nDisk Flags: \n");
            return Err(Failure {
                status: 1,
                stdout: out,
                stderr: format!("Error: {}: unrecognised disk label\n", path),
            });
        };

        out.push_str(&format!("Partition Table: {}\nDisk Flags: \n\n", label));
        out.push_str("Number  Start  End  Size  File system  Name  Flags\n");
        for partition in &disk.partitions {
            out.push_str(&format!(
                " {}  {}  {}  {}  {}  primary\n",
                partition.number,
                render(partition.start),
                render(partition.end),
                render(partition.size()),
                partition.filesystem.as_deref().unwrap_or("")
            ));
        }
        Ok(out)
    }

    fn parted_rm(&mut self, path: &str, number: &str) -> Reply {
        let name = path.trim_start_matches("/dev/").to_string();
        let number: u32 = number
            .parse()
            .map_err(|_| fail(1, format!("Error: Expecting a partition number: {}", number)))?;
        let device = partition_device(&name, number);
        if self.is_mounted(&device) {
            return Err(fail(
                1,
                format!(
                    "Error: Partition /dev/{} is being used. You must unmount it before you modify it with Parted.",
                    device
                ),
            ));
        }
        let disk = self.disk_mut(path)?;
        let before = disk.partitions.len();
        disk.partitions.retain(|p| p.number != number);
        if disk.partitions.len() == before {
            return Err(fail(1, "Error: Partition doesn't exist."));
        }
        Ok(String::new())
    }

    fn mkpart_full(&mut self, path: &str) -> Reply {
        let disk = self.disk_mut(path)?;
        if disk.label.is_none() {
            return Err(fail(1, format!("Error: {}: unrecognised disk label", path)));
        }
        if !disk.partitions.is_empty() {
            return Err(fail(1, "Error: Can't have overlapping partitions."));
        }
        let number = disk.next_number();
        let end = (disk.size / MIB - 1) * MIB - 1;
        disk.partitions.push(SimPartition {
            number,
            start: MIB,
            end,
            filesystem: None,
            letter: None,
        });
        Ok(String::new())
    }

    fn mkpart_sized(&mut self, path: &str, start: &str, end: &str) -> Reply {
        let parse = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|_| fail(1, format!("Error: Invalid number {}", value)))
        };
        let (start, end) = (parse(start)?, parse(end)?);
        let disk = self.disk_mut(path)?;
        if disk.label.is_none() {
            return Err(fail(1, format!("Error: {}: unrecognised disk label", path)));
        }
        if end <= start || end * MIB > disk.size {
            return Err(fail(
                1,
                format!("Error: The location {}MiB is outside of the device {}.", end, path),
            ));
        }
        let (first, last) = (start * MIB, end * MIB - 1);
        if disk
            .partitions
            .iter()
            .any(|p| first <= p.end && p.start <= last)
        {
            return Err(fail(1, "Error: Can't have overlapping partitions."));
        }
        let number = disk.next_number();
        disk.partitions.push(SimPartition {
            number,
            start: first,
            end: last,
            filesystem: None,
            letter: None,
        });
        Ok(String::new())
    }

    fn lsblk(&self) -> String {
        let mut out = String::from("sda disk\nsda1 part\nsda2 part\n");
        for (name, disk) in &self.disks {
            out.push_str(&format!("{} disk\n", name));
            for partition in &disk.partitions {
                out.push_str(&format!("{} part\n", partition_device(name, partition.number)));
            }
        }
        out
    }

    fn mkfs(&mut self, device: &str, filesystem: String) -> Reply {
        if self.is_mounted(device) {
            return Err(fail(
                1,
                format!("/dev/{} is mounted; will not make a filesystem here!", device),
            ));
        }
        let partition = self.disks.iter_mut().find_map(|(name, disk)| {
            disk.partitions
                .iter_mut()
                .find(|p| partition_device(name, p.number) == device)
        });
        match partition {
            Some(partition) => {
                partition.filesystem = Some(filesystem);
                Ok(String::new())
            }
            None => Err(fail(1, format!("The file /dev/{} does not exist", device))),
        }
    }

    fn mount(&mut self, source: &str, target: &str, dax: bool) -> Reply {
        let device = source.trim_start_matches("/dev/");
        let Some((_, partition)) = self.find_partition(device) else {
            return Err(fail(
                32,
                format!("mount: {}: wrong fs type, bad option, bad superblock on {}", target, source),
            ));
        };
        let fstype = partition.filesystem.clone().unwrap_or_default();
        if !self.directories.contains(target) {
            return Err(fail(32, format!("mount: {}: mount point does not exist.", target)));
        }
        if self.mounts.iter().any(|m| m.target == target) {
            return Err(fail(32, format!("mount: {}: mount point busy.", target)));
        }
        self.mounts.push(SimMount {
            source: source.to_string(),
            target: target.to_string(),
            fstype,
            dax,
        });
        Ok(String::new())
    }

    fn mount_table(&self) -> String {
        let mut out = String::from(
            "/dev/sda2 on / type xfs (rw,relatime,attr2)\nproc on /proc type proc (rw,nosuid,nodev,noexec,relatime)\n",
        );
        for mount in &self.mounts {
            out.push_str(&format!(
                "{} on {} type {} (rw,relatime{})\n",
                mount.source,
                mount.target,
                mount.fstype,
                if mount.dax { ",dax=always" } else { "" }
            ));
        }
        out
    }

    fn powershell(&mut self, command: &str) -> Reply {
        let pipeline = command
            .split_once("-Command \"")
            .and_then(|(_, rest)| rest.strip_suffix('"'))
            .ok_or_else(|| fail(1, "powershell: malformed command line"))?;

        if pipeline.starts_with("Get-PmemDisk | Select-Object") {
            let disks = self
                .namespaces
                .iter()
                .map(|namespace| {
                    let atomicity = if namespace.mode == "sector" {
                        "BlockTranslationTable"
                    } else {
                        "None"
                    };
                    json!({
                        "DiskNumber": namespace.disk.parse::<u32>().unwrap_or_default(),
                        "Size": namespace.size,
                        "AtomicityType": atomicity,
                    })
                })
                .collect();
            Ok(convert_to_json(disks))
        } else if pipeline.starts_with("Get-PmemUnusedRegion | Select-Object") {
            let regions = self
                .regions
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, region)| region.available > 0)
                .map(|(index, region)| {
                    json!({
                        "RegionId": index + 1,
                        "SocketId": region.socket,
                        "Size": region.available,
                    })
                })
                .collect();
            Ok(convert_to_json(regions))
        } else if pipeline == "Get-PmemDisk | Remove-PmemDisk -Confirm:$false" {
            self.remove_namespaces();
            Ok(String::new())
        } else if let Some(rest) = pipeline.strip_prefix("Get-PmemUnusedRegion -RegionId ") {
            let (id, atomicity) = rest
                .split_once(" | New-PmemDisk -AtomicityType ")
                .ok_or_else(|| fail(1, "New-PmemDisk: malformed pipeline"))?;
            let index: usize = id
                .trim()
                .parse()
                .map_err(|_| fail(1, format!("Get-PmemUnusedRegion: bad region id {}", id)))?;
            let socket = self
                .regions
                .get(index.wrapping_sub(1))
                .map(|region| region.socket)
                .ok_or_else(|| fail(1, format!("Get-PmemUnusedRegion: no region {}", id)))?;
            let mode = match atomicity.trim() {
                "BlockTranslationTable" => "sector",
                _ => "fsdax",
            };
            self.carve(socket, mode)?;
            Ok(String::new())
        } else {
            Err(fail(1, format!("The term '{}' is not recognized", pipeline)))
        }
    }

    fn pmem_disk_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self
            .disks
            .keys()
            .filter_map(|name| name.parse().ok())
            .collect();
        numbers.sort_unstable();
        numbers
    }

    fn taken_letters(&self) -> BTreeSet<char> {
        let mut taken = BTreeSet::from(['C', 'D']);
        for disk in self.disks.values() {
            taken.extend(disk.partitions.iter().filter_map(|p| p.letter));
        }
        taken
    }

    fn volume_row(index: usize, partition: &SimPartition, status: &str) -> String {
        format!(
            "  Volume {:<3}  {}   {:<11}  {:<5}  {:<10}  {:>7}  {}\n",
            index,
            partition.letter.unwrap_or(' '),
            "",
            partition.filesystem.as_deref().unwrap_or("RAW"),
            "Partition",
            diskpart_size(partition.size()),
            status
        )
    }

    fn diskpart(&mut self, script: &str) -> Reply {
        let Some(lines) = self.files.get(script).cloned() else {
            return Err(fail(1, "The system cannot find the file specified."));
        };

        let mut out = String::from(
            "\nMicrosoft DiskPart version 10.0.20348.1\n\nCopyright (C) Microsoft Corporation.\nOn computer: SUT-SIM\n\n",
        );
        let mut selected: Option<u32> = None;
        let mut focus: Option<u32> = None;

        for line in lines.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.diskpart_line(line, &mut selected, &mut focus) {
                Ok(text) => {
                    out.push_str(&text);
                    out.push('\n');
                }
                Err(message) => {
                    out.push_str(&message);
                    out.push('\n');
                    return Err(Failure {
                        status: 2,
                        stdout: out,
                        stderr: String::new(),
                    });
                }
            }
        }
        Ok(out)
    }

    fn selected_disk(&mut self, selected: Option<u32>) -> Result<&mut SimDisk, String> {
        let index = selected.ok_or("There is no disk selected.")?;
        self.disks
            .get_mut(&index.to_string())
            .ok_or_else(|| "The selected disk is the system disk.".to_string())
    }

    fn diskpart_line(
        &mut self,
        line: &str,
        selected: &mut Option<u32>,
        focus: &mut Option<u32>,
    ) -> Result<String, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["list", "disk"] => {
                let mut out = String::from(
                    "  Disk ###  Status         Size     Free     Dyn  Gpt\n  \
                     --------  -------------  -------  -------  ---  ---\n",
                );
                let mut rows = vec![(0u32, SYSTEM_DISK_BYTES, 0u64, true)];
                for number in self.pmem_disk_numbers() {
                    if let Some(disk) = self.disks.get(&number.to_string()) {
                        let used = disk.used_end().map(|end| end + 1).unwrap_or(0);
                        rows.push((number, disk.size, disk.size.saturating_sub(used), disk.label == Some("gpt")));
                    }
                }
                for (number, size, free, gpt) in rows {
                    out.push_str(&format!(
                        "  Disk {:<3}  {:<13}  {:>7}  {:>7}  {:<3}  {}\n",
                        number,
                        "Online",
                        diskpart_size(size),
                        diskpart_size(free),
                        "",
                        if gpt { "*" } else { "" }
                    ));
                }
                Ok(out)
            }
            ["list", "volume"] => {
                let mut out = String::from(
                    "  Volume ###  Ltr  Label        Fs     Type        Size     Status     Info\n  \
                     ----------  ---  -----------  -----  ----------  -------  ---------  --------\n  \
                     Volume 0     C   Windows      NTFS   Partition    475 GB  Healthy    Boot\n  \
                     Volume 1     D                       DVD-ROM         0 B  No Media\n",
                );
                let mut index = 2;
                for number in self.pmem_disk_numbers() {
                    if let Some(disk) = self.disks.get(&number.to_string()) {
                        for partition in &disk.partitions {
                            out.push_str(&Self::volume_row(index, partition, "Healthy"));
                            index += 1;
                        }
                    }
                }
                Ok(out)
            }
            ["select", "disk", number] => {
                let number: u32 = number
                    .parse()
                    .map_err(|_| "The arguments specified for this command are not valid.")?;
                if number != 0 && !self.disks.contains_key(&number.to_string()) {
                    return Err("The disk you specified is not valid.".to_string());
                }
                *selected = Some(number);
                *focus = None;
                Ok(format!("Disk {} is now the selected disk.", number))
            }
            ["attributes", "disk", "clear", "readonly"] => {
                self.selected_disk(*selected)?;
                Ok("Disk attributes cleared successfully.".to_string())
            }
            ["convert", table] => {
                let label = match *table {
                    "gpt" => "gpt",
                    "mbr" => "mbr",
                    _ => return Err("The arguments specified for this command are not valid.".to_string()),
                };
                let disk = self.selected_disk(*selected)?;
                if !disk.partitions.is_empty() {
                    return Err("The specified disk is not convertible.".to_string());
                }
                disk.label = Some(label);
                Ok(format!(
                    "DiskPart successfully converted the selected disk to {} format.",
                    label.to_uppercase()
                ))
            }
            ["clean"] => {
                let disk = self.selected_disk(*selected)?;
                disk.partitions.clear();
                disk.label = None;
                Ok("DiskPart succeeded in cleaning the disk.".to_string())
            }
            ["create", "partition", "primary", rest @ ..] => {
                let requested = match rest {
                    [] => None,
                    [size] => Some(
                        size.strip_prefix("size=")
                            .and_then(|mib| mib.parse::<u64>().ok())
                            .ok_or("The arguments specified for this command are not valid.")?
                            * MIB,
                    ),
                    _ => return Err("The arguments specified for this command are not valid.".to_string()),
                };
                let disk = self.selected_disk(*selected)?;
                if disk.label.is_none() {
                    disk.label = Some("mbr");
                }
                let start = disk.used_end().map(|end| end + 1).unwrap_or(MIB);
                let remaining = disk.size.saturating_sub(start + MIB);
                let size = requested.unwrap_or(remaining);
                if size == 0 || size > remaining {
                    return Err(
                        "There is not enough usable space for this operation.".to_string()
                    );
                }
                let number = disk.next_number();
                disk.partitions.push(SimPartition {
                    number,
                    start,
                    end: start + size - 1,
                    filesystem: None,
                    letter: None,
                });
                *focus = Some(number);
                Ok("DiskPart succeeded in creating the specified partition.".to_string())
            }
            ["assign", assignment] => {
                let letter = assignment
                    .strip_prefix("letter=")
                    .and_then(|letter| letter.chars().next())
                    .map(|letter| letter.to_ascii_uppercase())
                    .ok_or("The arguments specified for this command are not valid.")?;
                if self.taken_letters().contains(&letter) {
                    return Err(
                        "The specified drive letter is not free to be assigned.".to_string()
                    );
                }
                let number = focus.ok_or("There is no volume selected.")?;
                let disk = self.selected_disk(*selected)?;
                let partition = disk
                    .partitions
                    .iter_mut()
                    .find(|p| p.number == number)
                    .ok_or("There is no volume selected.")?;
                partition.letter = Some(letter);
                Ok("DiskPart successfully assigned the drive letter or mount point.".to_string())
            }
            ["detail", "disk"] => {
                let status = if self.unhealthy_volumes { "Failed" } else { "Healthy" };
                let index = selected.ok_or("There is no disk selected.")?;
                let disk = self.selected_disk(*selected)?.clone();
                let mut out = format!(
                    "SIM PMEM Disk\nDisk ID: {{5B0F2D7E-0A3B-4C1D-9E8F-0000000000{:02}}}\nType   : SCM\nStatus : Online\nPath   : 0\nRead-only  : No\n\n",
                    index
                );
                if disk.partitions.is_empty() {
                    out.push_str("There are no volumes.\n");
                } else {
                    out.push_str(
                        "  Volume ###  Ltr  Label        Fs     Type        Size     Status     Info\n  \
                         ----------  ---  -----------  -----  ----------  -------  ---------  --------\n",
                    );
                    for (offset, partition) in disk.partitions.iter().enumerate() {
                        out.push_str(&Self::volume_row(2 + offset, partition, status));
                    }
                }
                Ok(out)
            }
            ["list", "partition"] => {
                let disk = self.selected_disk(*selected)?;
                if disk.partitions.is_empty() {
                    return Ok("There are no partitions on this disk to show.".to_string());
                }
                let mut out = String::from(
                    "  Partition ###  Type              Size     Offset\n  \
                     -------------  ----------------  -------  -------\n",
                );
                for partition in &disk.partitions {
                    out.push_str(&format!(
                        "  Partition {:<3}  {:<16}  {:>7}  {:>7}\n",
                        partition.number,
                        "Primary",
                        diskpart_size(partition.size()),
                        format!("{} KB", partition.start / 1024)
                    ));
                }
                Ok(out)
            }
            _ => Err("The arguments specified for this command are not valid.".to_string()),
        }
    }

    fn format(&mut self, letter: char, filesystem: String) -> Reply {
        let partition = self
            .disks
            .values_mut()
            .flat_map(|disk| disk.partitions.iter_mut())
            .find(|p| p.letter == Some(letter));
        match partition {
            Some(partition) => {
                partition.filesystem = Some(filesystem);
                Ok("Format complete.\n".to_string())
            }
            None => Err(fail(1, "The system cannot find the drive specified.")),
        }
    }
}

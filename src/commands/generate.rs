//! Generate testdata command implementation.
//!
//! Writes a synthetic OpenHardwareMonitor `data.json` tree that can be served
//! through `--test-data-file`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// One node of a generated sensor tree, shaped like OHM's output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneratedNode {
    #[serde(rename = "id")]
    pub id: u32,
    pub text: String,
    pub min: String,
    pub value: String,
    pub max: String,
    #[serde(rename = "ImageURL")]
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    pub children: Vec<GeneratedNode>,
}

struct TreeBuilder {
    rng: StdRng,
    next_id: u32,
    sensors: usize,
}

impl TreeBuilder {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            next_id: 0,
            sensors: 0,
        }
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node(
        &mut self,
        text: &str,
        node_id: Option<String>,
        image: &str,
        children: Vec<GeneratedNode>,
    ) -> GeneratedNode {
        GeneratedNode {
            id: self.id(),
            text: text.to_string(),
            min: String::new(),
            value: String::new(),
            max: String::new(),
            image_url: format!("images_icon/{}.png", image),
            node_id,
            sensor_type: None,
            children,
        }
    }

    fn group(&mut self, text: &str, children: Vec<GeneratedNode>) -> GeneratedNode {
        self.node(text, None, "folder", children)
    }

    /// A sensor leaf with a value drawn from `range`.
    fn sensor(
        &mut self,
        hardware_id: &str,
        kind: &str,
        index: usize,
        text: &str,
        range: std::ops::Range<f64>,
    ) -> GeneratedNode {
        let unit = unit_suffix(kind);
        let low = self.rng.gen_range(range.clone());
        let value = self.rng.gen_range(low..=range.end);
        let high = self.rng.gen_range(value..=range.end);
        self.sensors += 1;

        GeneratedNode {
            id: self.id(),
            text: text.to_string(),
            min: format!("{:.1} {}", low, unit),
            value: format!("{:.1} {}", value, unit),
            max: format!("{:.1} {}", high, unit),
            image_url: "images/transparent.png".to_string(),
            node_id: Some(format!("{}/{}/{}", hardware_id, kind.to_ascii_lowercase(), index)),
            sensor_type: Some(kind.to_string()),
            children: Vec::new(),
        }
    }
}

fn unit_suffix(kind: &str) -> &'static str {
    match kind {
        "Temperature" => "°C",
        "Fan" => "RPM",
        "Load" | "Control" | "Level" => "%",
        "Clock" => "MHz",
        "Voltage" => "V",
        "Power" => "W",
        "Data" => "GB",
        "SmallData" => "MB",
        "Throughput" => "B/s",
        _ => "",
    }
}

/// Builds a synthetic tree. Returns the root and the number of sensor leaves.
pub fn generate_tree(cores: usize, disks: usize, seed: Option<u64>) -> (GeneratedNode, usize) {
    let mut b = TreeBuilder::new(seed);

    // Motherboard with a Super I/O chip
    let lpc = "/lpc/nct6798d";
    let voltages = vec![
        b.sensor(lpc, "Voltage", 0, "Vcore", 0.8..1.4),
        b.sensor(lpc, "Voltage", 1, "AVCC", 3.2..3.4),
        b.sensor(lpc, "Voltage", 2, "+3.3V", 3.2..3.4),
    ];
    let lpc_temps = vec![
        b.sensor(lpc, "Temperature", 0, "CPU Core", 30.0..75.0),
        b.sensor(lpc, "Temperature", 1, "Temperature #1", 25.0..50.0),
    ];
    let fans = vec![
        b.sensor(lpc, "Fan", 0, "Fan #1", 600.0..1800.0),
        b.sensor(lpc, "Fan", 1, "Fan #2", 600.0..1800.0),
    ];
    let controls = vec![b.sensor(lpc, "Control", 0, "Fan Control #1", 20.0..100.0)];
    let lpc_groups = vec![
        b.group("Voltages", voltages),
        b.group("Temperatures", lpc_temps),
        b.group("Fans", fans),
        b.group("Controls", controls),
    ];
    let superio = b.node("Nuvoton NCT6798D", Some(lpc.to_string()), "chip", lpc_groups);
    let mainboard = b.node(
        "ASUS ROG STRIX Z390-E GAMING",
        Some("/mainboard".to_string()),
        "mainboard",
        vec![superio],
    );

    // CPU
    let cpu = "/intelcpu/0";
    let mut clocks = vec![b.sensor(cpu, "Clock", 0, "Bus Speed", 99.0..101.0)];
    let mut temps = Vec::new();
    let mut loads = vec![b.sensor(cpu, "Load", 0, "CPU Total", 0.0..100.0)];
    for core in 1..=cores {
        let name = format!("CPU Core #{}", core);
        clocks.push(b.sensor(cpu, "Clock", core, &name, 800.0..4700.0));
        temps.push(b.sensor(cpu, "Temperature", core - 1, &name, 30.0..85.0));
        loads.push(b.sensor(cpu, "Load", core, &name, 0.0..100.0));
    }
    temps.push(b.sensor(cpu, "Temperature", cores, "CPU Package", 35.0..90.0));
    let powers = vec![
        b.sensor(cpu, "Power", 0, "CPU Package", 5.0..95.0),
        b.sensor(cpu, "Power", 1, "CPU Cores", 3.0..85.0),
    ];
    let cpu_groups = vec![
        b.group("Clocks", clocks),
        b.group("Temperatures", temps),
        b.group("Load", loads),
        b.group("Powers", powers),
    ];
    let cpu_node = b.node("Intel Core i7-9700K", Some(cpu.to_string()), "cpu", cpu_groups);

    // Memory
    let ram = "/ram/0";
    let ram_load = vec![b.sensor(ram, "Load", 0, "Memory", 10.0..90.0)];
    let ram_data = vec![
        b.sensor(ram, "Data", 0, "Used Memory", 2.0..28.0),
        b.sensor(ram, "Data", 1, "Available Memory", 2.0..28.0),
    ];
    let ram_groups = vec![b.group("Load", ram_load), b.group("Data", ram_data)];
    let ram_node = b.node("Generic Memory", Some(ram.to_string()), "ram", ram_groups);

    // GPU
    let gpu = "/nvidiagpu/0";
    let gpu_groups = vec![
        {
            let s = vec![b.sensor(gpu, "Temperature", 0, "GPU Core", 30.0..85.0)];
            b.group("Temperatures", s)
        },
        {
            let s = vec![
                b.sensor(gpu, "Load", 0, "GPU Core", 0.0..100.0),
                b.sensor(gpu, "Load", 1, "GPU Memory", 0.0..100.0),
            ];
            b.group("Load", s)
        },
        {
            let s = vec![b.sensor(gpu, "Fan", 0, "GPU", 0.0..3000.0)];
            b.group("Fans", s)
        },
        {
            let s = vec![
                b.sensor(gpu, "Clock", 0, "GPU Core", 300.0..1900.0),
                b.sensor(gpu, "Clock", 1, "GPU Memory", 400.0..9500.0),
            ];
            b.group("Clocks", s)
        },
        {
            let s = vec![
                b.sensor(gpu, "SmallData", 0, "GPU Memory Used", 200.0..10000.0),
                b.sensor(gpu, "SmallData", 1, "GPU Memory Free", 200.0..10000.0),
            ];
            b.group("Data", s)
        },
        {
            let s = vec![b.sensor(gpu, "Power", 0, "GPU Power", 10.0..320.0)];
            b.group("Powers", s)
        },
    ];
    let gpu_node = b.node("NVIDIA GeForce RTX 3080", Some(gpu.to_string()), "nvidia", gpu_groups);

    // Storage
    let mut disk_nodes = Vec::with_capacity(disks);
    for index in 0..disks {
        let hdd = format!("/hdd/{}", index);
        let temp = vec![b.sensor(&hdd, "Temperature", 0, "Temperature", 25.0..55.0)];
        let load = vec![b.sensor(&hdd, "Load", 0, "Used Space", 5.0..95.0)];
        let throughput = vec![
            b.sensor(&hdd, "Throughput", 0, "Read Rate", 0.0..500_000_000.0),
            b.sensor(&hdd, "Throughput", 1, "Write Rate", 0.0..500_000_000.0),
        ];
        let groups = vec![
            b.group("Temperatures", temp),
            b.group("Load", load),
            b.group("Throughput", throughput),
        ];
        let name = format!("Samsung SSD 970 EVO Plus 1TB #{}", index + 1);
        disk_nodes.push(b.node(&name, Some(hdd), "hdd", groups));
    }

    let mut hardware = vec![mainboard, cpu_node, ram_node, gpu_node];
    hardware.extend(disk_nodes);
    let computer = b.node("OHM-TESTRIG", None, "computer", hardware);
    let root = b.node("Sensor", None, "transparent", vec![computer]);

    debug!("Generated sensor tree with {} sensors", b.sensors);
    (root, b.sensors)
}

/// Generates a synthetic data.json file.
pub fn command_generate_testdata(
    output: PathBuf,
    cores: usize,
    disks: usize,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    println!("🧪 Generating synthetic sensor tree...");

    let (root, sensors) = generate_tree(cores, disks, seed);
    let json = serde_json::to_string_pretty(&root)?;
    fs::write(&output, json)?;

    println!("✅ Sensor tree written to: {}", output.display());
    println!("   ├─ CPU cores: {}", cores);
    println!("   ├─ Storage devices: {}", disks);
    println!("   └─ Sensors: {}", sensors);
    println!(
        "\nServe it with: ohm-exporter --test-data-file {}",
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{SensorClassifier, SensorKind};
    use crate::source::parse_sensor_tree;

    #[test]
    fn test_generated_tree_parses_completely() {
        let (root, sensors) = generate_tree(4, 2, Some(42));
        let body = serde_json::to_vec(&root).unwrap();

        let readings = parse_sensor_tree(&body).unwrap();
        assert_eq!(readings.len(), sensors);
        assert!(readings
            .iter()
            .all(|r| !r.hardware_path.is_empty() && r.hardware_path[0] == "OHM-TESTRIG"));

        let classifier = SensorClassifier::new();
        assert!(readings
            .iter()
            .all(|r| !matches!(classifier.classify(&r.sensor_type).kind, SensorKind::Unknown(_))));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = serde_json::to_string(&generate_tree(2, 1, Some(7)).0).unwrap();
        let b = serde_json::to_string(&generate_tree(2, 1, Some(7)).0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hardware_ids_reach_readings() {
        let (root, _) = generate_tree(1, 1, Some(1));
        let readings = parse_sensor_tree(&serde_json::to_vec(&root).unwrap()).unwrap();

        let gpu = readings
            .iter()
            .find(|r| r.sensor_name == "GPU Memory Used")
            .unwrap();
        assert_eq!(gpu.hardware_id.as_deref(), Some("/nvidiagpu/0"));
        assert_eq!(gpu.sensor_type, "SmallData");
    }
}

//! Property-based tests for argument assembly using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

use trainctl_core::args::RUN_FLAGS;
use trainctl_core::{EntryPoint, Invocation, RunConfig};

fn path_strategy() -> impl Strategy<Value = PathBuf> {
    "[a-z0-9_./ ]{0,24}".prop_map(PathBuf::from)
}

prop_compose! {
    fn run_config()(
        img_size in 32u32..4096,
        batch_size in 1u32..512,
        epochs in 0u32..1000,
        data in path_strategy(),
        weights in path_strategy(),
        project in path_strategy(),
        name in "[A-Za-z0-9][A-Za-z0-9_-]{0,15}",
        exist_ok in any::<bool>(),
        device in "(cpu|[0-7](,[0-7]){0,3})",
        hyp in path_strategy(),
        cfg in path_strategy(),
    ) -> RunConfig {
        RunConfig {
            img_size,
            batch_size,
            epochs,
            data,
            weights,
            project,
            name,
            exist_ok,
            device,
            hyp,
            cfg,
            extra_args: Vec::new(),
        }
    }
}

/// Parse `--flag value` pairs back out; `--exist-ok` carries no value.
fn parse_pairs(args: &[String]) -> BTreeMap<String, Vec<Option<String>>> {
    let mut pairs: BTreeMap<String, Vec<Option<String>>> = BTreeMap::new();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].clone();
        if flag == "--exist-ok" {
            pairs.entry(flag).or_default().push(None);
            i += 1;
        } else {
            pairs.entry(flag).or_default().push(args.get(i + 1).cloned());
            i += 2;
        }
    }
    pairs
}

proptest! {
    #[test]
    fn every_option_appears_exactly_once(run in run_config()) {
        let args: Vec<String> = run
            .to_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let pairs = parse_pairs(&args);

        for flag in RUN_FLAGS {
            let count = pairs.get(*flag).map_or(0, Vec::len);
            let expected = if *flag == "--exist-ok" && !run.exist_ok { 0 } else { 1 };
            prop_assert_eq!(count, expected, "flag {}", flag);
        }
        prop_assert!(pairs.keys().all(|k| RUN_FLAGS.contains(&k.as_str())));
    }

    #[test]
    fn values_match_configured_literals(run in run_config()) {
        let args: Vec<String> = run
            .to_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let pairs = parse_pairs(&args);
        let value = |flag: &str| pairs[flag][0].clone().unwrap_or_default();

        prop_assert_eq!(value("--imgsz"), run.img_size.to_string());
        prop_assert_eq!(value("--batch-size"), run.batch_size.to_string());
        prop_assert_eq!(value("--epochs"), run.epochs.to_string());
        prop_assert_eq!(PathBuf::from(value("--data")), run.data.clone());
        prop_assert_eq!(PathBuf::from(value("--weights")), run.weights.clone());
        prop_assert_eq!(PathBuf::from(value("--project")), run.project.clone());
        prop_assert_eq!(value("--name"), run.name.clone());
        prop_assert_eq!(value("--device"), run.device.clone());
        prop_assert_eq!(PathBuf::from(value("--hyp")), run.hyp.clone());
        prop_assert_eq!(PathBuf::from(value("--cfg")), run.cfg.clone());
    }

    #[test]
    fn invocation_env_matches_entry(devices in "[0-7](,[0-7]){0,3}", run in run_config()) {
        let entry = EntryPoint {
            visible_devices: devices.clone(),
            ..EntryPoint::default()
        };
        let inv = Invocation::new(&entry, &run);
        prop_assert_eq!(inv.device_env.1, devices);
        prop_assert_eq!(inv.args.len(), run.to_args().len() + 1);
    }
}

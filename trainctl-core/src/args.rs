//! Command-line assembly for the training entry point.

use crate::config::RunConfig;
use std::ffi::{OsStr, OsString};

/// Flags emitted for each table option, in emission order.
pub const RUN_FLAGS: &[&str] = &[
    "--imgsz",
    "--batch-size",
    "--epochs",
    "--data",
    "--weights",
    "--project",
    "--name",
    "--exist-ok",
    "--device",
    "--hyp",
    "--cfg",
];

impl RunConfig {
    /// Build the argument vector handed to the training entry point.
    ///
    /// Each option appears exactly once, in table order, followed by
    /// `extra_args` verbatim. `--exist-ok` is a bare flag emitted only when
    /// set. Values are not checked: an empty path is forwarded as an empty
    /// argument.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(RUN_FLAGS.len() * 2 + self.extra_args.len());

        push_option(&mut args, "--imgsz", self.img_size.to_string());
        push_option(&mut args, "--batch-size", self.batch_size.to_string());
        push_option(&mut args, "--epochs", self.epochs.to_string());
        push_option(&mut args, "--data", &self.data);
        push_option(&mut args, "--weights", &self.weights);
        push_option(&mut args, "--project", &self.project);
        push_option(&mut args, "--name", &self.name);
        if self.exist_ok {
            args.push(OsString::from("--exist-ok"));
        }
        push_option(&mut args, "--device", &self.device);
        push_option(&mut args, "--hyp", &self.hyp);
        push_option(&mut args, "--cfg", &self.cfg);

        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }
}

fn push_option(args: &mut Vec<OsString>, flag: &str, value: impl AsRef<OsStr>) {
    args.push(OsString::from(flag));
    args.push(value.as_ref().to_os_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_args_exact() {
        let args = as_strings(&RunConfig::default().to_args());
        assert_eq!(
            args,
            vec![
                "--imgsz",
                "1024",
                "--batch-size",
                "8",
                "--epochs",
                "300",
                "--data",
                "data/DOTA_ROTATED.yaml",
                "--weights",
                "weights/yolov5s.pt",
                "--project",
                "runs/train",
                "--name",
                "yolov5s_DOTA",
                "--exist-ok",
                "--device",
                "0",
                "--hyp",
                "data/hyps/obb/hyp.finetune_dota.yaml",
                "--cfg",
                "models/yolov5s.yaml",
            ]
        );
    }

    #[test]
    fn test_each_flag_appears_once() {
        let args = as_strings(&RunConfig::default().to_args());
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for arg in args.iter().filter(|a| a.starts_with("--")) {
            *counts.entry(arg.as_str()).or_default() += 1;
        }
        assert_eq!(counts.len(), RUN_FLAGS.len());
        for flag in RUN_FLAGS {
            assert_eq!(counts.get(flag), Some(&1), "flag {flag}");
        }
    }

    #[test]
    fn test_exist_ok_omitted_when_false() {
        let run = RunConfig {
            exist_ok: false,
            ..RunConfig::default()
        };
        let args = as_strings(&run.to_args());
        assert!(!args.iter().any(|a| a == "--exist-ok"));
        assert_eq!(args.len(), (RUN_FLAGS.len() - 1) * 2);
    }

    #[test]
    fn test_empty_dataset_path_is_forwarded() {
        let run = RunConfig {
            data: PathBuf::new(),
            ..RunConfig::default()
        };
        let args = as_strings(&run.to_args());
        let pos = args.iter().position(|a| a == "--data").unwrap();
        assert_eq!(args[pos + 1], "");
    }

    #[test]
    fn test_extra_args_appended_verbatim() {
        let run = RunConfig {
            extra_args: vec!["--cache".into(), "--workers".into(), "4".into()],
            ..RunConfig::default()
        };
        let args = as_strings(&run.to_args());
        let (table, extra) = args.split_at(args.len() - 3);
        assert_eq!(extra.to_vec(), vec!["--cache", "--workers", "4"]);
        assert_eq!(table.to_vec(), as_strings(&RunConfig::default().to_args()));
    }
}

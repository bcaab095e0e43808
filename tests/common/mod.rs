#![allow(dead_code)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub data_root: PathBuf,
    pub inputs: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let data_root = tmp.path().join("data");
        let inputs = tmp.path().join("inputs");
        fs::create_dir_all(&inputs).expect("create inputs dir");

        Self {
            _tmp: tmp,
            data_root,
            inputs,
        }
    }

    pub fn with_config(config: &str) -> Self {
        let env = Self::new();
        fs::create_dir_all(&env.data_root).expect("create data root");
        fs::write(env.data_root.join("leaderboard.toml"), config).expect("write config");
        env
    }

    pub fn cmd(&self, subcommand: &[&str]) -> Command {
        let mut cmd = cargo_bin_cmd!("qa-leaderboard");
        cmd.env("RUST_LOG", "warn")
            .args(subcommand)
            .arg("--data-root")
            .arg(&self.data_root);
        cmd
    }

    pub fn write_input(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.inputs.join(name);
        fs::write(&path, serde_json::to_vec_pretty(value).expect("encode input"))
            .expect("write input");
        path
    }

    pub fn submit(&self, file: &Path, model: &str, author: &str) -> assert_cmd::assert::Assert {
        self.cmd(&["submit"])
            .arg("--file")
            .arg(file)
            .args(["--model", model, "--author", author])
            .assert()
    }

    pub fn run_json(&self, subcommand: &[&str], extra: &[&str]) -> Value {
        let out = self
            .cmd(subcommand)
            .arg("--json")
            .args(extra)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn submission_count(&self) -> u64 {
        self.run_json(&["status"], &[])["submissions"]
            .as_u64()
            .expect("submission count")
    }
}

pub fn sample(
    qa_index: i64,
    prediction: &str,
    exact_match: bool,
    hallucinated: bool,
    label: &str,
) -> Value {
    json!({
        "content_id": "doc-1",
        "qa_index": qa_index,
        "question": format!("question {qa_index}"),
        "gold_answer": "gold",
        "prediction": prediction,
        "exact_match": exact_match,
        "f1_score": if exact_match { 1.0 } else { 0.0 },
        "answerable": !prediction.trim().is_empty(),
        "hallucinated": hallucinated,
        "type": label,
    })
}

pub fn one_of_each() -> Value {
    json!([
        sample(0, "invented", false, true, "hallucinated"),
        sample(1, "", false, false, "empty"),
        sample(2, "gold", true, false, "faithful_correct"),
        sample(3, "other", false, false, "faithful_incorrect"),
    ])
}

pub fn references() -> Value {
    json!([
        {"content_id": "doc-1", "qa_index": 0, "content_text": "passage zero"},
        {"content_id": "doc-1", "qa_index": 2, "content_text": "passage two"},
    ])
}

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const ENV_VARS: [&str; 7] = [
    "SIGCOMP_CONFIG",
    "SIGCOMP_CONV_POINTS",
    "SIGCOMP_FREQ_POINTS",
    "SIGCOMP_STEP_POINTS",
    "SIGCOMP_PRETTY",
    "SIGCOMP_LOG_LEVEL",
    "SIGCOMP_DEBUG",
];

// Runs in an empty directory with an empty home so no stray config file is picked up
fn sigcomp_command(workdir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sigcomp"));
    command.current_dir(workdir).env("HOME", workdir);
    for name in ENV_VARS {
        command.env_remove(name);
    }
    command
}

fn run_sigcomp(args: &[&str]) -> Output {
    let temp_dir = TempDir::new().unwrap();
    sigcomp_command(temp_dir.path())
        .args(args)
        .output()
        .expect("Failed to execute sigcomp binary")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_help_command() {
    let output = run_sigcomp(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sigcomp"));
    assert!(stdout.contains("laplace"));
    assert!(stdout.contains("inverse"));
    assert!(stdout.contains("SIGCOMP_CONV_POINTS"));
}

#[test]
fn test_version_command() {
    let output = run_sigcomp(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("sigcomp"));
}

#[test]
fn test_version_detailed_command() {
    let output = run_sigcomp(&["version", "--detailed"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sigcomp v"));
    assert!(stdout.contains("Target:"));
    assert!(stdout.contains("Profile:"));
}

#[test]
fn test_laplace_prints_transform_pair() {
    let value = stdout_json(&run_sigcomp(&["laplace", "exp(-2*t)*u(t)"]));
    assert_eq!(value["output_s"], "1/(s+2)");
    assert_eq!(value["roc"], "Re(s) > -2");
    assert_eq!(value["poles"][0], -2.0);
}

#[test]
fn test_inverse_causal_and_non_causal() {
    let causal = stdout_json(&run_sigcomp(&["inverse", "1/(s+2)"]));
    assert_eq!(causal["output_t"], "exp(-2*t)*Heaviside(t)");
    assert_eq!(causal["is_causal"], true);
    assert_eq!(causal["steps"][0]["step"], "Identify form");

    let plain = stdout_json(&run_sigcomp(&["inverse", "1/(s+2)", "--non-causal"]));
    assert_eq!(plain["output_t"], "exp(-2*t)");
    assert_eq!(plain["is_causal"], false);
}

#[test]
fn test_properties_command() {
    let value = stdout_json(&run_sigcomp(&["properties", "y[n] = x[n] + x[n-1]"]));
    assert_eq!(value["linearity"]["is_linear"], true);
    assert_eq!(value["memory"]["has_memory"], true);
}

#[test]
fn test_lti_compact_output() {
    let output = run_sigcomp(&["--compact", "lti", "1/(s+3)"]);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    assert_eq!(stdout.trim_end().lines().count(), 1);

    let value = stdout_json(&output);
    assert_eq!(value["stability"], "stable");
    assert_eq!(value["type"], "firstOrder");
    assert_eq!(value["frequencyResponse"]["magnitude"].as_array().unwrap().len(), 100);
}

#[test]
fn test_convolve_respects_environment_grid() {
    let temp_dir = TempDir::new().unwrap();
    let output = sigcomp_command(temp_dir.path())
        .env("SIGCOMP_CONV_POINTS", "50")
        .args(["convolve", "u(t)", "exp(-t)*u(t)"])
        .output()
        .unwrap();
    let value = stdout_json(&output);
    assert_eq!(value["output_y_array"].as_array().unwrap().len(), 99);
    assert_eq!(value["symbolic_result"], "(u(t)) * (exp(-t)*u(t))");
}

#[test]
fn test_config_file_sets_grids() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("grids.yaml");
    fs::write(
        &config_path,
        "engine:\n  convolution:\n    points: 20\n    start: -1.0\n    stop: 1.0\n  step:\n    points: 10\n    start: 0.0\n    stop: 1.0\n",
    )
    .unwrap();

    let config_arg = config_path.to_str().unwrap();
    let conv = sigcomp_command(temp_dir.path())
        .args(["--config", config_arg, "convolve", "u(t)", "u(t)"])
        .output()
        .unwrap();
    assert_eq!(
        stdout_json(&conv)["time_array"].as_array().unwrap().len(),
        39
    );

    let lti = sigcomp_command(temp_dir.path())
        .args(["--config", config_arg, "lti", "1/(s+1)"])
        .output()
        .unwrap();
    let value = stdout_json(&lti);
    assert_eq!(value["stepResponse"]["time"].as_array().unwrap().len(), 10);
    assert_eq!(value["frequencyResponse"]["phase"].as_array().unwrap().len(), 100);
}

#[test]
fn test_config_discovered_in_working_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(".sigcomp.json"),
        r#"{ "output": { "pretty": false } }"#,
    )
    .unwrap();

    let output = sigcomp_command(temp_dir.path())
        .args(["laplace", "u(t)"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    assert_eq!(stdout.trim_end().lines().count(), 1);
    assert_eq!(stdout_json(&output)["output_s"], "1/s");
}

#[test]
fn test_config_generate_and_show() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("generated.toml");

    let generate = sigcomp_command(temp_dir.path())
        .args(["config", "generate", "--output", output_path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(generate.status.success());
    let content = fs::read_to_string(&output_path).unwrap();
    assert!(content.contains("[engine.convolution]"));
    assert!(content.contains("points = 200"));

    let show = run_sigcomp(&["config", "show"]);
    assert!(show.status.success());
    let stdout = String::from_utf8_lossy(&show.stdout);
    assert!(stdout.contains("pretty: true"));
    assert!(stdout.contains("magnitude_db: -100.0"));

    let sample = run_sigcomp(&["config", "generate"]);
    assert!(sample.status.success());
    assert!(String::from_utf8_lossy(&sample.stdout).contains("convolution:"));
}

#[test]
fn test_missing_config_file_fails() {
    let output = run_sigcomp(&["--config", "/nonexistent/sigcomp.yaml", "laplace", "u(t)"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_input_error_exit_code() {
    let output = run_sigcomp(&["laplace", "__import__('os')"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid input"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_computation_error_exit_code() {
    let output = run_sigcomp(&["laplace", "tan(t)"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("tan(t)"));
}

use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[simulation]\n"
        + "initial_population = 40\n"
        + "initial_mode = \"randomized\"\n"
        + "steps_per_second = 1000\n"
        + "max_population = 400\n"
        + "seed = 17\n"
        + "history_limit = 500\n"
        + "\n"
        + "[genetics]\n"
        + "variant_precision = 1\n"
        + "inheritance_variation = 0.05\n"
        + "\n"
        + "[genetics.traits.consumption_rate]\n"
        + "min = 2.0\n"
        + "max = 4.0\n"
        + "default = 3.0\n"
        + "\n"
        + "[mutation]\n"
        + "per_gene_probability = 0.15\n"
        + "strength = 0.1\n"
        + "\n"
        + "[reproduction]\n"
        + "cost = 50.0\n"
        + "attractiveness_weight = 0.7\n"
        + "spawn_randomness = 0.1\n"
        + "\n"
        + "[resources]\n"
        + "initial_amount = 100.0\n"
        + "capacity = 1000.0\n"
        + "replenish_rate = 1000.0\n"
        + "starvation_threshold = 0.0\n"
        + "consumption_strength_bonus = 0.5\n"
        + "consumption = { model = \"flat\", amount = 5.0 }\n"
        + "\n"
        + "[interactions]\n"
        + "attractiveness_from_strength = 0.4\n"
        + "attractiveness_from_intelligence = 0.3\n"
        + "replication_penalty_threshold = 0.3\n"
        + "mutation_bonus_threshold = 0.7\n"
        + "\n"
        + "[survival]\n"
        + "threshold = 0.3\n"
        + "strength_weight = 0.6\n"
        + "intelligence_weight = 0.4\n"
        + "random_factor = 0.1\n"
        + "reference_amount = 100.0\n"
        + "\n"
        + "[lifespan]\n"
        + "model = \"consumption_derived\"\n"
        + "lifetime_consumption = 300.0\n"
        + "\n"
        + "[output]\n"
        + "generations = 60\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_vivarium"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create", "--realtime"]);

    assert!(test_dir.join("run-0000").join("history.msgpack").is_file());
    assert!(test_dir.join("run-0001").join("history.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results = fs::read_to_string(test_dir.join("run-0000").join("results.toml"))
        .expect("failed to read results file");
    let results: toml::Table = toml::from_str(&results).expect("failed to parse results file");
    assert!(results.contains_key("total_population"));
    assert!(results.contains_key("variants"));

    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}

use hs_data::{load_dataset, CatalogFilter, TrajectoryLoader};
use hs_types::{HyperparameterConfig, RunKey};
use tempfile::TempDir;

#[test]
fn written_keys_load_back_exactly() {
    let dir = TempDir::new().unwrap();
    let configs = [
        HyperparameterConfig::new(3e-05, 1e-05, 0.001, 0.7),
        HyperparameterConfig::new(0.0003, 0.0001, 0.01, 0.95),
        HyperparameterConfig::new(1.0 / 3.0, 2e-7, 0.0, 1.0),
    ];
    for config in configs {
        let key = RunKey::new(config, "hopper", "lambda_ac");
        std::fs::write(dir.path().join(key.file_name().unwrap()), "1,2,3\n4,5\n").unwrap();
    }

    let (dataset, skipped) =
        load_dataset(dir.path(), &CatalogFilter::default(), &TrajectoryLoader::new()).unwrap();
    assert_eq!(skipped, 0);
    assert_eq!(dataset.sets().len(), 3);
    for config in configs {
        let set = dataset
            .for_alg_env("lambda_ac", "hopper")
            .find(|s| s.key.config == config)
            .unwrap();
        assert_eq!(set.key.config.values(), config.values());
        assert_eq!(set.runs.len(), 2);
    }
}

#[test]
fn foreign_writers_and_stage_suffixes_are_understood() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path()
            .join("actorlr_1e-05_criticlr_0.001_entcoef_0.01_gaelambda_0.5_env_ant_alg_advn_norm_mean_avg.csv"),
        "0.5,0.75\n",
    )
    .unwrap();

    let filter = CatalogFilter::new(&["ant".to_string()], &[]);
    let (dataset, _) = load_dataset(dir.path(), &filter, &TrajectoryLoader::new()).unwrap();
    let set = &dataset.sets()[0];
    assert_eq!(set.key.alg, "advn_norm_mean");
    assert_eq!(set.key.config, HyperparameterConfig::new(0.00001, 0.001, 0.01, 0.5));
}

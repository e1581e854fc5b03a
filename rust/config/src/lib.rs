//! Configuration types shared between the bamboo crates.

mod invocation;
mod types;

pub use invocation::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn invocation() -> Invocation {
        Invocation {
            cluster: Cluster::from("catalyst"),
            executable: PathBuf::from("/opt/lbann/bin/lbann"),
            num_nodes: 1,
            num_processes: 2,
            dir_name: PathBuf::from("/repo"),
            data_reader: "synthetic".into(),
            model_folder: "tests/layer_tests".into(),
            model_name: "mean_absolute_error".into(),
            optimizer: "sgd".into(),
            output_file: PathBuf::from("/repo/out.txt"),
            error_file: PathBuf::from("/repo/err.txt"),
            data_filedir: None,
        }
    }

    #[test]
    fn test_cluster_strips_digits() {
        assert_eq!(Cluster::from_hostname("surface42").as_str(), "surface");
        assert_eq!(Cluster::from_hostname("surface123\n").as_str(), "surface");
        assert_eq!(Cluster::from_hostname("pascal").as_str(), "pascal");
    }

    #[test]
    fn test_compiler_from_str() {
        assert_eq!("gcc7".parse::<Compiler>().unwrap(), Compiler::Gcc7);
        assert_eq!("Intel18".parse::<Compiler>().unwrap(), Compiler::Intel18);
        assert!("gcc5".parse::<Compiler>().is_err());
        for compiler in Compiler::ALL {
            assert_eq!(compiler.key().parse::<Compiler>().unwrap(), compiler);
        }
    }

    #[test]
    fn test_enum_serde() {
        assert_eq!(
            serde_json::from_str::<Compiler>("\"clang4\"").unwrap(),
            Compiler::Clang4
        );
        assert_eq!(
            serde_json::from_str::<ModelCategory>("\"cifar10\"").unwrap(),
            ModelCategory::Cifar10
        );
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(
            ModelCategory::classify("model_mnist_lenet.prototext"),
            Some(ModelCategory::Mnist)
        );
        assert_eq!(
            ModelCategory::classify("model_alexnet.prototext"),
            Some(ModelCategory::Imagenet)
        );
        assert_eq!(
            ModelCategory::classify("model_cifar10_resnet.prototext"),
            Some(ModelCategory::Imagenet)
        );
        assert_eq!(
            ModelCategory::classify("model_mnist_cifar10.prototext"),
            Some(ModelCategory::Mnist)
        );
        assert_eq!(
            ModelCategory::classify("model_cifar10.prototext"),
            Some(ModelCategory::Cifar10)
        );
        assert_eq!(ModelCategory::classify("model_autoencoder.prototext"), None);
    }

    #[test]
    fn test_invocation_paths() {
        let inv = invocation();
        assert_eq!(
            inv.model_path(),
            PathBuf::from("/repo/model_zoo/tests/layer_tests/model_mean_absolute_error.prototext")
        );
        assert_eq!(
            inv.reader_path(),
            PathBuf::from("/repo/model_zoo/data_readers/data_reader_synthetic.prototext")
        );
        assert_eq!(
            inv.optimizer_path(),
            PathBuf::from("/repo/model_zoo/optimizers/opt_sgd.prototext")
        );
    }

    #[test]
    fn test_to_cli_args() {
        let mut inv = invocation();
        let args = inv.to_cli_args();
        assert_eq!(args.len(), 3);
        assert!(args[0].starts_with("--model="));
        assert!(args[1].starts_with("--reader="));
        assert!(args[2].starts_with("--optimizer="));

        inv.data_filedir = Some(PathBuf::from("/data/mnist"));
        let args = inv.to_cli_args();
        assert_eq!(args.last().unwrap(), "--data_filedir=/data/mnist");
    }

    #[test]
    fn test_scheduler_defaults_from_toml() {
        let settings: SchedulerSettings = toml::from_str(
            r#"
time_limit_minutes = 30

[partitions]
ray = "pbatch"
"#,
        )
        .unwrap();
        assert_eq!(settings.allocator, "salloc");
        assert_eq!(settings.launcher, "srun");
        assert_eq!(settings.time_limit_minutes, 30);
        assert_eq!(settings.setup_time_limit_minutes, 1);
        assert_eq!(settings.partition_for(&Cluster::from("ray")), "pbatch");
        assert_eq!(settings.partition_for(&Cluster::from("surface")), "pdebug");
    }
}

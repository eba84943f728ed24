pub mod config {
    use crate::todo::{DuplicateTitlePolicy, TreeRules};
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        pub jwt_secret: String,
        /// Which sibling tasks must have distinct titles.
        #[serde(default)]
        pub duplicate_task_titles: DuplicateTitlePolicy,
        /// Whether a user may own two lists with the same title.
        #[serde(default = "default_unique_list_titles")]
        pub unique_list_titles: bool,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_source(config::Environment::default())
        }

        /// Loads configuration from a single `config` source.
        pub fn from_source<S>(source: S) -> anyhow::Result<Self>
        where
            S: config::Source + Send + Sync + 'static,
        {
            let settings = config::Config::builder().add_source(source).build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }

        /// Rules handed to the tree integrity engine.
        pub fn tree_rules(&self) -> TreeRules {
            TreeRules {
                duplicate_task_titles: self.duplicate_task_titles,
                unique_list_titles: self.unique_list_titles,
            }
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_unique_list_titles() -> bool {
        true
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use config::{File, FileFormat};

        #[test]
        fn applies_defaults_for_optional_keys() {
            let source = File::from_str(
                r#"
                db_url = "sqlite::memory:"
                jwt_secret = "secret"
                "#,
                FileFormat::Toml,
            );

            let config = Config::from_source(source).unwrap();

            assert_eq!(config.port, 8080);
            assert_eq!(config.tree_rules(), TreeRules::default());
        }

        #[test]
        fn reads_duplicate_title_policy() {
            let source = File::from_str(
                r#"
                db_url = "postgres://localhost/todo"
                jwt_secret = "secret"
                port = 9000
                duplicate_task_titles = "top_level"
                unique_list_titles = false
                "#,
                FileFormat::Toml,
            );

            let config = Config::from_source(source).unwrap();

            assert_eq!(config.port, 9000);
            assert_eq!(
                config.tree_rules(),
                TreeRules {
                    duplicate_task_titles: DuplicateTitlePolicy::TopLevel,
                    unique_list_titles: false,
                }
            );
        }

        #[test]
        fn requires_database_url() {
            let source = File::from_str(r#"jwt_secret = "secret""#, FileFormat::Toml);
            assert!(Config::from_source(source).is_err());
        }
    }
}
pub mod auth;
pub mod entities;
pub mod todo;
pub mod web;

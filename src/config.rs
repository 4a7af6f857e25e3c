use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "i18n-autowrap.json";

/// Configuration for i18n-autowrap
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// File suffixes eligible for scanning (e.g., ["vue", "ts", "js"])
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,

    /// File or directory names / wildcard patterns excluded from discovery
    #[serde(default = "default_ignore_paths")]
    pub ignore_paths: Vec<String>,

    /// Key file the extracted mapping is merged into
    #[serde(default = "default_output")]
    pub output: String,

    /// Sort keys alphabetically when writing the key file
    #[serde(default)]
    pub sort_keys: bool,

    /// What to do when the key file already holds a different value for a key
    #[serde(default)]
    pub merge_policy: MergePolicy,

    #[serde(default)]
    pub vue: VueConfig,

    #[serde(default = "ScriptConfig::default_for_modules")]
    pub typescript: ScriptConfig,

    #[serde(default = "ScriptConfig::default_for_modules")]
    pub javascript: ScriptConfig,
}

/// Conflict policy used when merging a registry into an existing key file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Existing values win
    #[default]
    KeepFirst,
    /// Newly extracted values replace existing ones
    Overwrite,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VueConfig {
    /// Inserted into `<script>` when the script section gets rewritten
    #[serde(default)]
    pub import_statement: String,

    /// Inserted after the import statement (e.g. `const { t } = useI18n();`)
    #[serde(default)]
    pub instance_statement: String,

    #[serde(default)]
    pub i18n_method: VueMethods,

    /// Elements whose plain-text body is rewritten as a whole element
    #[serde(default = "default_text_elements")]
    pub text_elements: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VueMethods {
    /// Lookup function used in markup
    #[serde(default = "default_vue_template_method")]
    pub template: String,

    /// Lookup function used in the embedded script
    #[serde(default = "default_vue_script_method")]
    pub script: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    #[serde(default = "default_module_import")]
    pub import_statement: String,

    #[serde(default = "default_module_method")]
    pub i18n_method: String,
}

fn default_file_extensions() -> Vec<String> {
    vec!["vue".to_string(), "ts".to_string(), "js".to_string()]
}

fn default_ignore_paths() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "dist".to_string(),
        ".git".to_string(),
    ]
}

fn default_output() -> String {
    "locales/zh-CN.json".to_string()
}

fn default_text_elements() -> Vec<String> {
    [
        "button",
        "el-button",
        "el-radio",
        "el-radio-button",
        "el-checkbox",
        "el-tag",
        "el-link",
        "a-button",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_vue_template_method() -> String {
    "$t".to_string()
}

fn default_vue_script_method() -> String {
    "this.$t".to_string()
}

fn default_module_import() -> String {
    "import i18n from '@/i18n';".to_string()
}

fn default_module_method() -> String {
    "i18n.t".to_string()
}

impl Default for VueMethods {
    fn default() -> Self {
        Self {
            template: default_vue_template_method(),
            script: default_vue_script_method(),
        }
    }
}

impl Default for VueConfig {
    fn default() -> Self {
        Self {
            import_statement: String::new(),
            instance_statement: String::new(),
            i18n_method: VueMethods::default(),
            text_elements: default_text_elements(),
        }
    }
}

impl ScriptConfig {
    fn default_for_modules() -> Self {
        Self {
            import_statement: default_module_import(),
            i18n_method: default_module_method(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self::default_for_modules()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_extensions: default_file_extensions(),
            ignore_paths: default_ignore_paths(),
            output: default_output(),
            sort_keys: false,
            merge_policy: MergePolicy::default(),
            vue: VueConfig::default(),
            typescript: ScriptConfig::default_for_modules(),
            javascript: ScriptConfig::default_for_modules(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON (or JSON5, by extension) file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json5 = path
            .extension()
            .map(|ext| ext == "json5")
            .unwrap_or(false);

        let config: Config = if is_json5 {
            json5::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json_string(json_str: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json_str)
            .with_context(|| "Failed to parse config JSON string")?;
        Ok(config)
    }

    /// Try to load from default config file, or return default config
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Every lookup function a rewritten file may already contain
    pub fn lookup_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = vec![
            self.vue.i18n_method.template.clone(),
            self.vue.i18n_method.script.clone(),
            self.typescript.i18n_method.clone(),
            self.javascript.i18n_method.clone(),
        ];
        for builtin in ["$t", "$tc", "t", "i18n.t", "this.$t", "i18n.global.t"] {
            methods.push(builtin.to_string());
        }
        methods.retain(|m| !m.trim().is_empty());
        methods.sort();
        methods.dedup();
        methods
    }
}

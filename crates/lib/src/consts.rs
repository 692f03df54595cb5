/// Basename of the project configuration file (without extension).
pub const CONFIG_BASENAME: &str = "ts-make";

/// Name of the built-in plugin whose actions are registered unprefixed.
pub const BUILTIN_PLUGIN_NAME: &str = "@ts-make";

/// Name of the target used when no target is requested and no default is declared.
pub const DEFAULT_TARGET_NAME: &str = "default";

/// Project-local directory holding installed Lua packages.
pub const MODULES_DIR: &str = "lua_modules";

/// Transient directory (inside [`MODULES_DIR`]) for compiled script configs.
pub const COMPILE_TMP_DIR: &str = ".ts-make-tmp";

/// Package manifest inspected for an `exports` map.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Length of the path hash appended to compiled artifact names.
pub const ARTIFACT_HASH_LEN: usize = 12;

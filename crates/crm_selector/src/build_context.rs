use std::collections::HashMap;
use std::sync::OnceLock;

use crm_types::Primitive;

use crate::error::SelectorError;
use crate::platform::{platforms_by_alias, platforms_by_arch, platforms_by_os, Arch, OperatingSystem, Platform, PlatformAlias};

/// The build environment context for selector and template-expression evaluation: target
/// platform, architecture/OS/alias flags derived from it, and whatever build variables (most
/// commonly `python`/`numpy`) the caller supplies.
#[derive(Debug, Clone)]
pub struct BuildContext {
    platform: Platform,
    build_env_vars: HashMap<String, Primitive>,
    context: HashMap<String, Primitive>,
    selector_context: HashMap<String, Primitive>,
}

impl BuildContext {
    pub fn new(platform: Platform, build_env_vars: HashMap<String, Primitive>) -> Result<Self, SelectorError> {
        let py_np = py_np_context(&build_env_vars)?;
        let mut context = build_env_vars.clone();
        context.extend(py_np);
        context.extend(platform_context(platform));

        let selector_context = context
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().coerce_selector_view()))
            .collect();

        Ok(Self {
            platform,
            build_env_vars,
            context,
            selector_context,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn context(&self) -> &HashMap<String, Primitive> {
        &self.context
    }

    pub fn selector_context(&self) -> &HashMap<String, Primitive> {
        &self.selector_context
    }

    pub fn build_env_vars(&self) -> &HashMap<String, Primitive> {
        &self.build_env_vars
    }
}

fn platform_context(platform: Platform) -> HashMap<String, Primitive> {
    static CACHE: OnceLock<std::sync::Mutex<HashMap<Platform, HashMap<String, Primitive>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(HashMap::new()));
    {
        let guard = cache.lock().unwrap();
        if let Some(ctx) = guard.get(&platform) {
            return ctx.clone();
        }
    }

    let mut ctx = HashMap::new();
    ctx.insert("build_platform".to_string(), Primitive::Str(platform.as_str().to_string()));
    ctx.insert("target_platform".to_string(), Primitive::Str(platform.as_str().to_string()));
    for alias in PlatformAlias::ALL.iter().copied() {
        ctx.insert(alias.as_str().to_string(), Primitive::Bool(platforms_by_alias(alias).contains(&platform)));
    }
    for arch in Arch::ALL.iter().copied() {
        ctx.insert(arch.as_str().to_string(), Primitive::Bool(platforms_by_arch(arch).contains(&platform)));
    }
    for os in OperatingSystem::ALL.iter().copied() {
        ctx.insert(os.as_str().to_string(), Primitive::Bool(platforms_by_os(os).contains(&platform)));
    }

    cache.lock().unwrap().insert(platform, ctx.clone());
    ctx
}

fn py_np_context(build_env_vars: &HashMap<String, Primitive>) -> Result<HashMap<String, Primitive>, SelectorError> {
    let mut ctx = HashMap::new();

    if let Some(python) = build_env_vars.get("python") {
        let version = version_digits("Python", python)?;
        ctx.insert("py".to_string(), Primitive::Int(version));
        let raw = python.as_str().unwrap_or_default();
        ctx.insert("py3k".to_string(), Primitive::Bool(raw.starts_with("3.")));
        ctx.insert("py2k".to_string(), Primitive::Bool(raw.starts_with("2.")));
        ctx.insert("py27".to_string(), Primitive::Bool(version == 27));
        ctx.insert("py34".to_string(), Primitive::Bool(version == 34));
        ctx.insert("py35".to_string(), Primitive::Bool(version == 35));
        ctx.insert("py36".to_string(), Primitive::Bool(version == 36));
    }

    if let Some(numpy) = build_env_vars.get("numpy") {
        let version = version_digits("NumPy", numpy)?;
        ctx.insert("np".to_string(), Primitive::Int(version));
    }

    Ok(ctx)
}

fn version_digits(component: &'static str, value: &Primitive) -> Result<i64, SelectorError> {
    let raw = value
        .as_str()
        .ok_or_else(|| SelectorError::InvalidVersion {
            component,
            value: value.to_string(),
        })?;
    let digits: String = raw.chars().filter(|c| *c != '.').collect();
    digits.parse::<i64>().map_err(|_| SelectorError::InvalidVersion {
        component,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_64_sets_linux_and_linux64_and_x86_64() {
        let ctx = BuildContext::new(Platform::Linux64, HashMap::new()).unwrap();
        assert_eq!(ctx.context().get("linux"), Some(&Primitive::Bool(true)));
        assert_eq!(ctx.context().get("linux64"), Some(&Primitive::Bool(true)));
        assert_eq!(ctx.context().get("x86_64"), Some(&Primitive::Bool(true)));
        assert_eq!(ctx.context().get("win"), Some(&Primitive::Bool(false)));
    }

    #[test]
    fn python_3_6_sets_py36_and_py_int() {
        let mut vars = HashMap::new();
        vars.insert("python".to_string(), Primitive::from("3.6"));
        let ctx = BuildContext::new(Platform::Linux64, vars).unwrap();
        assert_eq!(ctx.context().get("py"), Some(&Primitive::Int(36)));
        assert_eq!(ctx.context().get("py36"), Some(&Primitive::Bool(true)));
        assert_eq!(ctx.context().get("py3k"), Some(&Primitive::Bool(true)));
    }

    #[test]
    fn malformed_python_version_is_an_error() {
        let mut vars = HashMap::new();
        vars.insert("python".to_string(), Primitive::from("not-a-version"));
        assert!(BuildContext::new(Platform::Linux64, vars).is_err());
    }
}

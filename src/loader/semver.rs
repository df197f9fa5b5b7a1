use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// maps short aliases of a package to its fully versioned name
pub type AliasMap = HashMap<String, String>;

lazy_static! {
    static ref SEMVER_RE: Regex = Regex::new(
        r"^([0-9]+)\.([0-9]+)\.([0-9]+)(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+[0-9A-Za-z-]+)?$"
    )
    .expect("invalid semver regex");
}

/// compute the aliases for the versioned first segment of a normalized name
///
/// for `lodash@4.17.21/index.js` this returns `lodash`, `lodash@4` and `lodash@4.17`, all mapped
/// to `lodash@4.17.21`. The path after the first segment never ends up in the map.
/// Names without a version, with an empty package name or with a version that is not semver
/// produce an empty map.
pub fn semver_map(normalized_name: &str) -> AliasMap {
    let mut map = AliasMap::new();

    let version = match normalized_name.find('/') {
        Some(slash) => &normalized_name[..slash],
        None => normalized_name,
    };

    let at = match version.rfind('@') {
        Some(at) => at,
        None => return map,
    };

    let package_name = &version[..at];
    if package_name.is_empty() {
        return map;
    }

    if let Some(caps) = SEMVER_RE.captures(&version[at + 1..]) {
        let major = &caps[1];
        let minor = &caps[2];
        map.insert(package_name.to_string(), version.to_string());
        map.insert(format!("{}@{}", package_name, major), version.to_string());
        map.insert(
            format!("{}@{}.{}", package_name, major, minor),
            version.to_string(),
        );
    } else {
        log::trace!("semver_map: {} has no semver version", normalized_name);
    }

    map
}

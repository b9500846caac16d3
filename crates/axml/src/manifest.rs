use crate::dom::{Document, Element};

const ACTION_MAIN: &str = "android.intent.action.MAIN";
const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

/// One `<activity>` declaration with its launcher metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Fully qualified class name
    pub name: String,

    /// Declared a MAIN + LAUNCHER intent filter (directly or via an alias)
    pub is_launcher: bool,

    /// Declared a MAIN action
    pub is_main: bool,
}

/// Entry-point metadata extracted from a parsed manifest document
///
/// See: <https://developer.android.com/guide/topics/manifest/manifest-intro>
#[derive(Debug, Default)]
pub struct Manifest {
    /// The `package` attribute of the root element
    pub package: String,

    /// Fully qualified application class, when one is declared
    pub application: Option<String>,

    /// Activities in declaration order, duplicates merged
    pub activities: Vec<Activity>,

    pub version_code: Option<String>,
    pub version_name: Option<String>,
    pub min_sdk_version: Option<String>,
    pub target_sdk_version: Option<String>,
}

impl Manifest {
    pub fn interpret(document: &Document) -> Manifest {
        let Some(root) = document.root.as_ref() else {
            return Manifest::default();
        };

        let package = root.attr("package").unwrap_or_default().to_owned();

        let mut manifest = Manifest {
            package: package.clone(),
            version_code: root.attr("versionCode").map(str::to_owned),
            version_name: root.attr("versionName").map(str::to_owned),
            ..Manifest::default()
        };

        if let Some(uses_sdk) = root.children_named("uses-sdk").next() {
            manifest.min_sdk_version = uses_sdk.attr("minSdkVersion").map(str::to_owned);
            manifest.target_sdk_version = uses_sdk.attr("targetSdkVersion").map(str::to_owned);
        }

        for application in root.children_named("application") {
            if manifest.application.is_none() {
                manifest.application = application
                    .attr("name")
                    .map(|name| resolve_class_name(&package, name));
            }

            for child in &application.children {
                match child.name.as_str() {
                    "activity" => {
                        let Some(name) = child.attr("name") else {
                            continue;
                        };
                        let name = resolve_class_name(&package, name);
                        let (is_main, is_launcher) = intent_flags(child);
                        manifest.merge_activity(name, is_launcher, is_main);
                    }
                    "activity-alias" => {
                        // the alias contributes its flags to the aliased
                        // activity, not to a list entry of its own
                        let Some(target) = child.attr("targetActivity") else {
                            continue;
                        };
                        let target = resolve_class_name(&package, target);
                        let (is_main, is_launcher) = intent_flags(child);
                        manifest.merge_activity(target, is_launcher, is_main);
                    }
                    _ => {}
                }
            }
        }

        manifest
    }

    /// Activities with the LAUNCHER category, in declaration order
    pub fn launcher_activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.iter().filter(|a| a.is_launcher)
    }

    /// Duplicate names merge by OR-ing their flags
    fn merge_activity(&mut self, name: String, is_launcher: bool, is_main: bool) {
        match self.activities.iter_mut().find(|a| a.name == name) {
            Some(existing) => {
                existing.is_launcher |= is_launcher;
                existing.is_main |= is_main;
            }
            None => self.activities.push(Activity {
                name,
                is_launcher,
                is_main,
            }),
        }
    }
}

/// Scan the element's intent filters for the MAIN action and LAUNCHER
/// category
fn intent_flags(activity: &Element) -> (bool, bool) {
    let mut is_main = false;
    let mut is_launcher = false;

    for filter in activity.children_named("intent-filter") {
        for child in &filter.children {
            match child.name.as_str() {
                "action" if child.attr("name") == Some(ACTION_MAIN) => is_main = true,
                "category" if child.attr("name") == Some(CATEGORY_LAUNCHER) => is_launcher = true,
                _ => {}
            }
        }
    }

    (is_main, is_launcher)
}

/// The manifest allows three spellings of a class name: `.Foo` and `Foo`
/// are relative to the package, `com.x.Foo` is already qualified
fn resolve_class_name(package: &str, name: &str) -> String {
    if let Some(relative) = name.strip_prefix('.') {
        return format!("{}.{}", package, relative);
    }
    if !name.contains('.') {
        return format!("{}.{}", package, name);
    }

    name.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Attribute;
    use crate::structs::TypedValue;
    use smallvec::SmallVec;

    fn attr(name: &str, value: &str) -> Attribute {
        Attribute {
            name: name.to_owned(),
            namespace: None,
            value: TypedValue::String(value.to_owned()),
            raw: Some(value.to_owned()),
            resource_id: None,
        }
    }

    fn element(name: &str, attrs: Vec<Attribute>, children: Vec<Element>) -> Element {
        let mut e = Element::new(name, None);
        e.attributes = SmallVec::from_vec(attrs);
        e.children = children;
        e
    }

    fn launcher_filter() -> Element {
        element(
            "intent-filter",
            vec![],
            vec![
                element("action", vec![attr("name", ACTION_MAIN)], vec![]),
                element("category", vec![attr("name", CATEGORY_LAUNCHER)], vec![]),
            ],
        )
    }

    fn document(root: Element) -> Document {
        Document {
            root: Some(root),
            namespaces: Default::default(),
        }
    }

    #[test]
    fn package_and_application() {
        let root = element(
            "manifest",
            vec![attr("package", "com.example.app")],
            vec![element(
                "application",
                vec![attr("name", ".App")],
                vec![],
            )],
        );

        let manifest = Manifest::interpret(&document(root));
        assert_eq!(manifest.package, "com.example.app");
        assert_eq!(manifest.application.as_deref(), Some("com.example.app.App"));
    }

    #[test]
    fn class_name_forms() {
        assert_eq!(resolve_class_name("com.x", ".Foo"), "com.x.Foo");
        assert_eq!(resolve_class_name("com.x", "Foo"), "com.x.Foo");
        assert_eq!(resolve_class_name("com.x", "com.y.Foo"), "com.y.Foo");
    }

    #[test]
    fn launcher_activity_detected() {
        let root = element(
            "manifest",
            vec![attr("package", "com.example.app")],
            vec![element(
                "application",
                vec![],
                vec![
                    element(
                        "activity",
                        vec![attr("name", ".Main")],
                        vec![launcher_filter()],
                    ),
                    element("activity", vec![attr("name", ".Settings")], vec![]),
                ],
            )],
        );

        let manifest = Manifest::interpret(&document(root));
        assert_eq!(manifest.activities.len(), 2);
        assert_eq!(
            manifest.activities[0],
            Activity {
                name: "com.example.app.Main".to_owned(),
                is_launcher: true,
                is_main: true,
            }
        );
        assert!(!manifest.activities[1].is_launcher);
        assert_eq!(manifest.launcher_activities().count(), 1);
    }

    #[test]
    fn alias_flags_fold_into_target() {
        let root = element(
            "manifest",
            vec![attr("package", "com.example.app")],
            vec![element(
                "application",
                vec![],
                vec![
                    element("activity", vec![attr("name", ".Main")], vec![]),
                    element(
                        "activity-alias",
                        vec![
                            attr("name", ".Alias"),
                            attr("targetActivity", ".Main"),
                        ],
                        vec![launcher_filter()],
                    ),
                ],
            )],
        );

        let manifest = Manifest::interpret(&document(root));
        let main = manifest
            .activities
            .iter()
            .find(|a| a.name == "com.example.app.Main")
            .unwrap();
        assert!(main.is_launcher);
        assert!(main.is_main);
        // the alias itself is not a separate activity
        assert_eq!(manifest.activities.len(), 1);
    }

    #[test]
    fn duplicate_activities_merge() {
        let root = element(
            "manifest",
            vec![attr("package", "com.x")],
            vec![element(
                "application",
                vec![],
                vec![
                    element("activity", vec![attr("name", ".A")], vec![]),
                    element("activity", vec![attr("name", ".A")], vec![launcher_filter()]),
                ],
            )],
        );

        let manifest = Manifest::interpret(&document(root));
        assert_eq!(manifest.activities.len(), 1);
        assert!(manifest.activities[0].is_launcher);
    }

    #[test]
    fn missing_root_yields_empty_manifest() {
        let manifest = Manifest::interpret(&Document::default());
        assert!(manifest.package.is_empty());
        assert!(manifest.activities.is_empty());
    }
}

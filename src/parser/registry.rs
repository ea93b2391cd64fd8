use super::grammar::Grammar;
use super::{CategoryMap, ClassView, Handler};
use crate::error::Result;
use tree_sitter::Language;

/// Extraction routine: finds every block of one category in the parsed tree
pub type ExtractFn = fn(&Grammar) -> Result<Vec<Handler>>;

/// Registration entry declared by a language plugin
#[derive(Clone, Copy)]
pub struct Routine {
    pub category: &'static str,
    pub class_level: bool,
    pub extract: ExtractFn,
}

impl Routine {
    pub const fn flat(category: &'static str, extract: ExtractFn) -> Self {
        Self {
            category,
            class_level: false,
            extract,
        }
    }

    pub const fn class_level(category: &'static str, extract: ExtractFn) -> Self {
        Self {
            category,
            class_level: true,
            extract,
        }
    }
}

impl std::fmt::Debug for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routine")
            .field("category", &self.category)
            .field("class_level", &self.class_level)
            .finish()
    }
}

/// Language front end: grammar plus the table of extraction routines
pub trait LanguagePlugin: Send + Sync {
    fn language_name(&self) -> &'static str;

    fn tree_sitter_language(&self) -> Language;

    /// Routines in registration order
    fn routines(&self) -> &'static [Routine];
}

/// Run every routine of `plugin` against the parsed tree.
///
/// Handlers are tagged with the routine's category and class-level flag. When
/// two routines share a category their output is concatenated in table order.
pub fn collect(plugin: &dyn LanguagePlugin, grammar: &Grammar) -> Result<CategoryMap> {
    let mut map = CategoryMap::new();

    for routine in plugin.routines() {
        let mut handlers = (routine.extract)(grammar)?;
        for handler in &mut handlers {
            handler.category = routine.category.to_string();
            handler.class_level = routine.class_level;
        }

        tracing::debug!(
            "{}: {} -> {} handlers",
            plugin.language_name(),
            routine.category,
            handlers.len()
        );

        map.entry(routine.category.to_string())
            .or_default()
            .extend(handlers);
    }

    Ok(map)
}

/// Regroup a category map by owning class.
///
/// The class-level flag of a category is read from its first handler. Flat
/// categories keep a plain name list, except "classes" whose names become the
/// class keys. Class-level handlers without a class name are left out of the
/// view; they remain in the category map.
pub fn build_class_view(map: &CategoryMap) -> ClassView {
    let mut view = ClassView::default();

    if let Some(classes) = map.get("classes") {
        for class_name in classes.iter().filter_map(|h| h.name.clone()) {
            view.classes.entry(class_name).or_default();
        }
    }

    for (category, handlers) in map {
        let class_level = handlers.first().map_or(false, |h| h.class_level);

        if !class_level {
            if category == "classes" {
                continue;
            }
            view.flat.insert(
                category.clone(),
                handlers.iter().filter_map(|h| h.name.clone()).collect(),
            );
            continue;
        }

        for handler in handlers {
            let (Some(class_name), Some(name)) = (&handler.class_name, &handler.name) else {
                tracing::warn!(
                    "Dropping {} at lines {}-{} from class view: no class name",
                    category,
                    handler.start_line,
                    handler.end_line
                );
                continue;
            };

            view.classes
                .entry(class_name.clone())
                .or_default()
                .entry(category.clone())
                .or_default()
                .push(name.clone());
        }
    }

    view
}

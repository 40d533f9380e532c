use std::collections::HashSet;
use tracing::debug;

pub const MAX_TAGS: usize = 8;

const EXTENSION_TAGS: &[(&str, &[&str])] = &[
    ("js", &["javascript", "frontend"]),
    ("ts", &["typescript", "frontend"]),
    ("jsx", &["react", "javascript", "frontend"]),
    ("tsx", &["react", "typescript", "frontend"]),
    ("py", &["python", "backend"]),
    ("java", &["java", "backend"]),
    ("cs", &["csharp", "backend"]),
    ("cpp", &["cpp", "backend"]),
    ("c", &["c", "backend"]),
    ("go", &["golang", "backend"]),
    ("rs", &["rust", "backend"]),
    ("php", &["php", "backend"]),
    ("rb", &["ruby", "backend"]),
    ("css", &["css", "frontend", "styling"]),
    ("scss", &["sass", "css", "frontend", "styling"]),
    ("html", &["html", "frontend", "markup"]),
    ("sql", &["sql", "database"]),
    ("json", &["json", "config"]),
    ("yml", &["yaml", "config"]),
    ("yaml", &["yaml", "config"]),
    ("md", &["markdown", "documentation"]),
    ("dockerfile", &["docker", "devops"]),
    ("sh", &["bash", "scripting", "devops"]),
];

const CONTENT_TAGS: &[(&str, &[&str])] = &[
    ("react", &["usestate", "useeffect", "jsx", "component"]),
    ("vue", &["vue", "v-if", "v-for", "@click"]),
    ("angular", &["@component", "@injectable", "ngoninit"]),
    ("nodejs", &["require(", "module.exports", "express"]),
    ("database", &["select", "insert", "update", "delete", "create table"]),
    ("api", &["fetch(", "axios", "http", "endpoint"]),
    ("testing", &["test(", "describe(", "expect(", "jest", "mocha"]),
    ("authentication", &["auth", "login", "password", "token", "jwt"]),
    ("security", &["hash", "encrypt", "decrypt", "secure"]),
    ("performance", &["optimize", "cache", "performance", "speed"]),
    ("error-handling", &["try", "catch", "error", "exception"]),
    ("async", &["async", "await", "promise", "settimeout"]),
    ("algorithms", &["sort", "search", "algorithm", "complexity"]),
    ("data-structures", &["array", "object", "map", "set", "list"]),
];

const FRAMEWORK_TAGS: &[(&str, &[&str])] = &[
    ("express", &["express"]),
    ("fastify", &["fastify"]),
    ("koa", &["koa"]),
    ("nestjs", &["@nestjs"]),
    ("spring", &["@springbootapplication", "@restcontroller"]),
    ("django", &["django", "from django"]),
    ("flask", &["from flask"]),
    ("laravel", &["use illuminate"]),
    ("rails", &["rails.application"]),
];

/// Offline tag derivation from a file identity and its content.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagGenerator;

impl TagGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Run all three passes, then dedupe (first occurrence wins) and cap at eight.
    pub fn generate(&self, file: &str, content: &str) -> Vec<String> {
        let lower = content.to_lowercase();

        let mut tags: Vec<&str> = Vec::new();
        tags.extend(Self::extension_tags(file));
        tags.extend(Self::matching_tags(CONTENT_TAGS, &lower));
        tags.extend(Self::matching_tags(FRAMEWORK_TAGS, &lower));

        let mut seen = HashSet::new();
        let tags: Vec<String> = tags
            .into_iter()
            .filter(|tag| seen.insert(*tag))
            .take(MAX_TAGS)
            .map(str::to_string)
            .collect();

        debug!("Generated {} tags for {}", tags.len(), file);
        tags
    }

    fn extension_tags(file: &str) -> Vec<&'static str> {
        let name = file.rsplit(['/', '\\']).next().unwrap_or(file);
        let ext = name.rsplit('.').next().unwrap_or(name).to_lowercase();

        EXTENSION_TAGS
            .iter()
            .find(|(key, _)| *key == ext)
            .map(|(_, tags)| tags.to_vec())
            .unwrap_or_default()
    }

    fn matching_tags(table: &[(&'static str, &[&str])], lower: &str) -> Vec<&'static str> {
        table
            .iter()
            .filter(|(_, needles)| needles.iter().any(|needle| lower.contains(needle)))
            .map(|(tag, _)| *tag)
            .collect()
    }
}

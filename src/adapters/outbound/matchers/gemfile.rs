use super::mark_declared;
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{
    ArtifactDescriptor, FileLocations, FilePosition, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{column_at, text_to_lines};
use std::path::Path;
use tree_sitter::{Node, Parser, Point};

const GEMFILE: &str = "Gemfile";
const GEMS_RB: &str = "gems.rb";
const GEMS_LOCKED: &str = "gems.locked";

/// One `gem` call of a Gemfile.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GemDeclaration {
    name: String,
    requirements: Vec<String>,
    groups: Vec<String>,
    locations: FileLocations,
}

/// Walks the Ruby syntax tree of a Gemfile, collecting `gem` calls with the
/// groups they belong to: the enclosing `group ... do` blocks and their own
/// `group:` option.
struct GemfileReader<'s> {
    source: &'s [u8],
    lines: Vec<String>,
    filename: &'s str,
    gems: Vec<GemDeclaration>,
}

impl<'s> GemfileReader<'s> {
    fn new(text: &'s str, filename: &'s str) -> Self {
        Self {
            source: text.as_bytes(),
            lines: text_to_lines(text),
            filename,
            gems: Vec::new(),
        }
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    /// 1-based line and character column of a tree-sitter point, whose column
    /// counts bytes.
    fn locate(&self, point: Point) -> (usize, usize) {
        let column = self
            .lines
            .get(point.row)
            .map_or(point.column + 1, |line| column_at(line, point.column));
        (point.row + 1, column)
    }

    fn span(&self, node: Node<'_>) -> FilePosition {
        let (line_start, column_start) = self.locate(node.start_position());
        let (line_end, column_end) = self.locate(node.end_position());
        FilePosition::new(
            self.filename,
            Position::new(line_start, line_end),
            Position::new(column_start, column_end),
        )
    }

    /// Value of a string or symbol literal, with the node spanning it
    /// (quotes and colon excluded).
    fn literal<'t>(&self, node: Node<'t>) -> Option<(String, Node<'t>)> {
        match node.kind() {
            "string" => {
                let mut cursor = node.walk();
                let content = node
                    .named_children(&mut cursor)
                    .find(|child| child.kind() == "string_content");
                match content {
                    Some(content) => Some((self.text(content).to_string(), content)),
                    None => Some((String::new(), node)),
                }
            }
            "simple_symbol" => Some((self.text(node).trim_start_matches(':').to_string(), node)),
            "hash_key_symbol" => Some((self.text(node).to_string(), node)),
            _ => None,
        }
    }

    /// Literal values among the named children of `node`.
    fn literals(&self, node: Node<'_>) -> Vec<String> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter_map(|child| self.literal(child))
            .map(|(value, _)| value)
            .collect()
    }

    /// Groups named by `group:`/`groups:` options anywhere under `node`.
    fn option_groups(&self, node: Node<'_>, groups: &mut Vec<String>) {
        if node.kind() == "pair" {
            let key = node
                .child_by_field_name("key")
                .and_then(|key| self.literal(key))
                .map(|(key, _)| key)
                .unwrap_or_default();
            if key == "group" || key == "groups" {
                if let Some(value) = node.child_by_field_name("value") {
                    match value.kind() {
                        "array" => groups.extend(self.literals(value)),
                        _ => groups.extend(self.literal(value).map(|(group, _)| group)),
                    }
                }
                return;
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.option_groups(child, groups);
        }
    }

    fn read_gem(&mut self, call: Node<'_>, enclosing_groups: &[String]) {
        let Some(arguments) = call.child_by_field_name("arguments") else {
            return;
        };
        let mut cursor = arguments.walk();
        let values: Vec<Node<'_>> = arguments
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .collect();

        let Some((name, name_node)) = values
            .first()
            .filter(|first| first.kind() == "string")
            .and_then(|first| self.literal(*first))
        else {
            return;
        };
        let requirements: Vec<(String, Node<'_>)> = values[1..]
            .iter()
            .take_while(|value| value.kind() == "string")
            .filter_map(|value| self.literal(*value))
            .collect();

        let mut groups = enclosing_groups.to_vec();
        self.option_groups(arguments, &mut groups);
        groups.dedup();

        let locations = FileLocations::new(self.span(call))
            .with_name(Some(self.span(name_node)))
            .with_version(requirements.first().map(|(_, node)| self.span(*node)));

        self.gems.push(GemDeclaration {
            name,
            requirements: requirements.into_iter().map(|(value, _)| value).collect(),
            groups,
            locations,
        });
    }

    fn visit(&mut self, node: Node<'_>, groups: &[String]) {
        if node.kind() == "call" {
            let method = node
                .child_by_field_name("method")
                .map(|method| self.text(method))
                .unwrap_or_default();
            match method {
                "gem" => {
                    self.read_gem(node, groups);
                    return;
                }
                "group" => {
                    if let Some(block) = node.child_by_field_name("block") {
                        let mut nested = groups.to_vec();
                        if let Some(arguments) = node.child_by_field_name("arguments") {
                            nested.extend(self.literals(arguments));
                        }
                        self.visit_children(block, &nested);
                        return;
                    }
                }
                _ => {}
            }
        }
        self.visit_children(node, groups);
    }

    fn visit_children(&mut self, node: Node<'_>, groups: &[String]) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, groups);
        }
    }
}

fn read_gemfile(file: &dyn DepFile) -> Result<Vec<GemDeclaration>, ExtractError> {
    let path = Path::new(file.path());
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_ruby::LANGUAGE.into())
        .map_err(|e| ExtractError::parse(path, e))?;
    let tree = parser
        .parse(file.text(), None)
        .ok_or_else(|| ExtractError::parse(path, "the Ruby parser produced no syntax tree"))?;

    let mut reader = GemfileReader::new(file.text(), file.path());
    reader.visit(tree.root_node(), &[]);
    Ok(reader.gems)
}

/// Matcher for the `Gemfile` (or `gems.rb`) next to a Bundler lockfile.
///
/// The lockfile is the source of truth: gems only declared in the Gemfile
/// are skipped.
#[derive(Debug, Default)]
pub struct GemfileMatcher;

impl Matcher for GemfileMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        if lockfile.file_name() == GEMS_LOCKED {
            lockfile.open(GEMS_RB)
        } else {
            lockfile.open(GEMFILE)
        }
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        for gem in read_gemfile(source_file)? {
            let mut matched = false;
            for record in records.iter_mut().filter(|record| record.name == gem.name) {
                matched = true;
                mark_declared(
                    record,
                    &gem.requirements.join(", "),
                    None,
                    Some(gem.locations.clone()),
                );
                for group in &gem.groups {
                    record.add_dep_group(group.as_str());
                }
            }
            if !matched {
                tracing::warn!(
                    "Skipping package {:?} from {} as it does not exist in the lockfile",
                    gem.name,
                    source_file.path()
                );
            }
        }

        Ok(None)
    }
}

//! Builder for FFmpeg `-filter_complex` programs.
//!
//! Each node consumes labelled pads and produces one or more new labelled
//! pads. Later nodes refer to earlier outputs by label, so a chain of
//! transitions is built by threading the returned label into the next call.

use std::fmt::Write as _;

/// A pad reference such as `0:v` or `xf1`. Rendered in square brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pad(String);

impl Pad {
    /// Video stream of input file `index`.
    pub fn video(index: usize) -> Self {
        Self(format!("{}:v", index))
    }

    /// Audio stream of input file `index`.
    pub fn audio(index: usize) -> Self {
        Self(format!("{}:a", index))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The `[label]` form used in `-map` arguments and the graph text.
    pub fn bracketed(&self) -> String {
        format!("[{}]", self.0)
    }
}

#[derive(Debug, Clone)]
struct Node {
    inputs: Vec<Pad>,
    filter: String,
    outputs: Vec<Pad>,
}

/// Accumulates filter nodes and renders them as one filter program.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    nodes: Vec<Node>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with a single output pad and return that pad.
    pub fn add(&mut self, inputs: &[&Pad], filter: impl Into<String>, output: &str) -> Pad {
        let out = Pad::named(output);
        self.add_multi(inputs, filter, &[out.clone()]);
        out
    }

    /// Add a node with any number of output pads.
    pub fn add_multi(&mut self, inputs: &[&Pad], filter: impl Into<String>, outputs: &[Pad]) {
        self.nodes.push(Node {
            inputs: inputs.iter().map(|p| (*p).clone()).collect(),
            filter: filter.into(),
            outputs: outputs.to_vec(),
        });
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render the `;`-separated program text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            for pad in &node.inputs {
                let _ = write!(out, "[{}]", pad.name());
            }
            out.push_str(&node.filter);
            for pad in &node.outputs {
                let _ = write!(out, "[{}]", pad.name());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_forms() {
        assert_eq!(Pad::video(2).bracketed(), "[2:v]");
        assert_eq!(Pad::audio(0).name(), "0:a");
        assert_eq!(Pad::named("vout").bracketed(), "[vout]");
    }

    #[test]
    fn test_empty_graph_renders_empty() {
        let graph = FilterGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.render(), "");
    }

    #[test]
    fn test_chained_nodes_reference_previous_labels() {
        let mut graph = FilterGraph::new();
        let a = graph.add(&[&Pad::video(0), &Pad::video(1)], "xfade=offset=1", "x1");
        let b = graph.add(&[&a, &Pad::video(2)], "xfade=offset=2", "vout");

        assert_eq!(b, Pad::named("vout"));
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.render(),
            "[0:v][1:v]xfade=offset=1[x1];[x1][2:v]xfade=offset=2[vout]"
        );
    }

    #[test]
    fn test_multi_output_node() {
        let mut graph = FilterGraph::new();
        graph.add_multi(
            &[&Pad::named("v0"), &Pad::named("a0")],
            "concat=n=1:v=1:a=1",
            &[Pad::named("vout"), Pad::named("aout")],
        );
        assert_eq!(graph.render(), "[v0][a0]concat=n=1:v=1:a=1[vout][aout]");
    }
}

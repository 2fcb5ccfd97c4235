use clap::Parser;
use keiro::codec::{EdgeDoc, NodeDoc, WorkflowDocument};
use keiro::control_flow::EdgeCondition;
use keiro::overlay::{EventLog, ExecutionEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};
use std::fs;

/// A CLI tool to generate random workflow documents for the Keiro engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated workflow JSON file to
    #[arg(short, long, default_value = "generated_workflow.json")]
    output: String,

    /// Also write a matching execution event log here
    #[arg(short, long)]
    events: Option<String>,

    /// Number of steps between start and end
    #[arg(long, default_value_t = 8)]
    steps: usize,

    /// Seed for reproducible output; random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);

    println!("Generating workflow with {} steps (seed {})...", cli.steps, seed);

    let mut builder = DocumentBuilder::default();
    let start = builder.node("start", Map::new());
    let mut tail = start;
    for step in 0..cli.steps {
        tail = match rng.random_range(0..5) {
            0 => builder.decision(tail, step, &mut rng),
            1 => builder.parallel(tail, step, &mut rng),
            2 => builder.looped(tail, step),
            _ => {
                let task = builder.task(step, &mut rng);
                builder.edge(tail, task, None, None);
                task
            }
        };
    }
    let end = builder.node("end", Map::new());
    builder.edge(tail, end, None, None);

    let document = builder.finish();
    println!(
        "-> Generated {} nodes and {} edges.",
        document.nodes.len(),
        document.edges.len()
    );
    fs::write(&cli.output, document.to_json_pretty()?)?;
    println!("Successfully saved workflow to '{}'", cli.output);

    if let Some(path) = &cli.events {
        let log = generate_events(&document, &mut rng);
        fs::write(path, serde_json::to_string_pretty(&log)?)?;
        println!("-> Generated {} events, saved to '{}'", log.events.len(), path);
    }

    Ok(())
}

#[derive(Default)]
struct DocumentBuilder {
    nodes: Vec<NodeDoc>,
    edges: Vec<EdgeDoc>,
}

impl DocumentBuilder {
    fn node(&mut self, node_type: &str, fields: Map<String, Value>) -> usize {
        self.nodes.push(NodeDoc {
            node_type: node_type.to_string(),
            position: None,
            fields,
            extra: None,
        });
        self.nodes.len() - 1
    }

    /// Edges carry no slot names, so importing exercises the binding rules.
    fn edge(&mut self, source: usize, target: usize, condition: Option<EdgeCondition>, label: Option<&str>) {
        self.edges.push(EdgeDoc {
            source,
            target,
            source_slot: String::new(),
            target_slot: String::new(),
            condition,
            label: label.map(str::to_string),
            extra: None,
        });
    }

    fn task(&mut self, step: usize, rng: &mut StdRng) -> usize {
        let mut fields = Map::new();
        fields.insert("prompt".into(), json!(format!("Step {}", step)));
        fields.insert("temperature".into(), json!(rng.random_range(0..10) as f64 / 10.0));
        self.node("llm", fields)
    }

    fn merge(&mut self, inputs: &[usize]) -> usize {
        let wait_for: Vec<String> = (0..inputs.len()).map(|i| format!("input_{}", i)).collect();
        let mut fields = Map::new();
        fields.insert("wait_for".into(), json!(wait_for));
        let merge = self.node("merge", fields);
        for source in inputs {
            self.edge(*source, merge, None, None);
        }
        merge
    }

    fn decision(&mut self, from: usize, step: usize, rng: &mut StdRng) -> usize {
        let mut fields = Map::new();
        fields.insert("branches".into(), json!(["yes", "no"]));
        let decision = self.node("decision", fields);
        self.edge(from, decision, None, None);

        let threshold = rng.random_range(1..100);
        let yes = self.task(step, rng);
        let no = self.task(step, rng);
        self.edge(decision, yes, Some(EdgeCondition::equals("answer", "yes")), None);
        self.edge(
            decision,
            no,
            Some(EdgeCondition::less("score", threshold)),
            Some("no"),
        );
        self.merge(&[yes, no])
    }

    fn parallel(&mut self, from: usize, step: usize, rng: &mut StdRng) -> usize {
        let width = rng.random_range(2..=4);
        let mut fields = Map::new();
        fields.insert("branches".into(), json!(width));
        let fork = self.node("parallel", fields);
        self.edge(from, fork, None, None);
        let branches: Vec<usize> = (0..width)
            .map(|_| {
                let task = self.task(step, rng);
                self.edge(fork, task, None, None);
                task
            })
            .collect();
        self.merge(&branches)
    }

    fn looped(&mut self, from: usize, step: usize) -> usize {
        let mut fields = Map::new();
        fields.insert("max_iterations".into(), json!(3));
        let head = self.node("loop", fields);
        self.edge(from, head, None, None);
        let mut body_fields = Map::new();
        body_fields.insert("prompt".into(), json!(format!("Iterate {}", step)));
        let body = self.node("llm", body_fields);
        self.edge(head, body, None, Some("body"));
        let after = self.node("llm", Map::new());
        self.edge(head, after, None, Some("exit"));
        after
    }

    fn finish(self) -> WorkflowDocument {
        WorkflowDocument {
            info: Some(json!({"name": "generated"})),
            options: None,
            nodes: self.nodes,
            edges: self.edges,
            variables: None,
        }
    }
}

/// Walks the nodes in document order, failing the occasional one.
fn generate_events(document: &WorkflowDocument, rng: &mut StdRng) -> EventLog {
    let mut events = vec![ExecutionEvent::new("workflow.start")];
    let mut failed = false;
    for (index, node) in document.nodes.iter().enumerate() {
        events.push(ExecutionEvent::for_node("node.start", index));
        let mut end = ExecutionEvent::for_node("node.end", index);
        if !failed && node.node_type == "llm" && rng.random_bool(0.05) {
            end.status = Some("failed".to_string());
            end.error = Some(json!("model timed out"));
            failed = true;
        } else {
            end.status = Some("completed".to_string());
        }
        if node.node_type == "decision" {
            let branch = if rng.random_bool(0.5) { "yes" } else { "no" };
            end.branch = Some(branch.to_string());
        }
        events.push(end);
        if failed {
            break;
        }
    }
    let mut finish = ExecutionEvent::new("workflow.end");
    finish.status = Some(if failed { "failed" } else { "completed" }.to_string());
    events.push(finish);
    EventLog { events }
}

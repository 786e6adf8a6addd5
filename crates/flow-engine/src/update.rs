//! Incremental update passes
//!
//! A pass recomputes the tools affected by the changes recorded since the
//! last pass started:
//!
//! 1. Seed the out-of-date set with the changed tools and every tool left
//!    `stale` or `running` by a superseded pass.
//! 2. Grow the set to a fixpoint over connections: the owner of an input whose
//!    source is out of date is out of date too. The set only grows and is
//!    bounded by the tool count, so this terminates even with cycles.
//! 3. Run, concurrently, every out-of-date tool whose active inputs are all
//!    unconnected, up to date or errored, propagating each result downstream.
//!    Repeat until nothing is eligible. A tool runs at most once per tool in
//!    the graph within one pass.
//! 4. Whatever is left is part of a cycle.
//!
//! The graph generation is compared under the lock before every step; a pass
//! whose generation is no longer current stops without touching the graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::events::GraphEvent;
use crate::manager::{Changes, Graph, ManagerInner};
use crate::port::{InputRef, Output, OutputRef, ToolId};
use crate::tool::{PreparedRun, ToolState};

/// Inputs fed by each output, flagged with whether the input is active
type Dependents = HashMap<OutputRef, Vec<(InputRef, bool)>>;

fn dependents(graph: &Graph) -> Dependents {
    let mut map: Dependents = HashMap::new();
    for tool in graph.tools() {
        let ports = tool.ports();
        for input in ports.all_inputs() {
            if let Some(connection) = input.connection() {
                map.entry(connection.output().clone())
                    .or_default()
                    .push((input.to_ref(), ports.is_input_active(input.name())));
            }
        }
    }
    map
}

fn tool_names(graph: &Graph, ids: &HashSet<ToolId>) -> Vec<String> {
    graph
        .tools()
        .iter()
        .filter(|t| ids.contains(&t.id()))
        .map(|t| t.name().to_string())
        .collect()
}

/// Phase 1
fn seed(graph: &mut Graph, changes: Option<Changes>) -> HashSet<ToolId> {
    let mut out_of_date: HashSet<ToolId> = match changes {
        Some(Changes::All) => graph.tools().iter().map(|t| t.id()).collect(),
        Some(Changes::Tools(ids)) => ids,
        None => HashSet::new(),
    };
    for tool in graph.tools() {
        if matches!(
            tool.state(),
            ToolState::Stale | ToolState::Running | ToolState::Cycle
        ) {
            out_of_date.insert(tool.id());
        }
    }
    out_of_date.retain(|id| graph.tool(*id).is_some());
    for id in &out_of_date {
        if let Some(tool) = graph.tool_mut(*id) {
            tool.set_state(ToolState::Stale);
        }
    }
    out_of_date
}

/// Phase 2
fn close_over_dependents(graph: &mut Graph, out_of_date: &mut HashSet<ToolId>, limit: usize) {
    // Active outputs per tool, fixed for the duration of this phase
    let sources: HashMap<ToolId, (String, HashSet<String>)> = graph
        .tools()
        .iter()
        .map(|t| {
            let outputs = t.ports().outputs().map(|o| o.name().to_string()).collect();
            (t.id(), (t.name().to_string(), outputs))
        })
        .collect();

    loop {
        let mut grew = false;
        for tool in graph.tools.iter_mut() {
            let id = tool.id();
            let active: HashSet<String> =
                tool.ports().inputs().map(|i| i.name().to_string()).collect();
            let mut affected = false;
            for input in tool.ports_mut().all_inputs_mut() {
                let is_active = active.contains(input.name());
                let Some(connection) = input.connection.as_mut() else {
                    continue;
                };
                let source = &connection.output;
                match sources.get(&source.tool) {
                    Some((_, outputs)) if outputs.contains(&source.name) => {
                        if out_of_date.contains(&source.tool) {
                            connection.up_to_date = false;
                            connection.error = None;
                            affected |= is_active;
                        }
                    }
                    // Hidden inputs are checked again when shown
                    _ if !is_active => connection.up_to_date = false,
                    found => {
                        let tool_name =
                            found.map_or_else(|| source.tool.to_string(), |(n, _)| n.clone());
                        connection.up_to_date = false;
                        connection.error = Some(format!(
                            "Connected output {}.{} no longer exists",
                            tool_name, source.name
                        ));
                        affected = true;
                    }
                }
            }
            if affected && out_of_date.insert(id) {
                tool.set_state(ToolState::Stale);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    out_of_date.extend(graph.drain_propagations(limit));
    refresh_lagging(graph, out_of_date, limit);
}

/// Re-propagate active inputs left behind while their source settled
///
/// An input hidden when its source changed keeps a stale value until it is
/// shown again. Hooks can show it during any phase, so this runs after every
/// batch of propagations.
fn refresh_lagging(graph: &mut Graph, out_of_date: &mut HashSet<ToolId>, limit: usize) {
    for _ in 0..limit {
        let lagging: Vec<InputRef> = graph
            .tools()
            .iter()
            .flat_map(|tool| tool.ports().inputs())
            .filter(|input| {
                input.connection().is_some_and(|c| {
                    let source = c.output().tool;
                    !c.is_up_to_date()
                        && c.error().is_none()
                        && !out_of_date.contains(&source)
                        && graph.tool(source).is_some_and(|t| {
                            !matches!(t.state(), ToolState::Stale | ToolState::Running)
                        })
                })
            })
            .map(|input| input.to_ref())
            .collect();
        if lagging.is_empty() {
            return;
        }
        for input in lagging {
            if let Err(e) = graph.propagate(&input) {
                log::warn!("Failed to refresh {}: {}", input.name, e);
            }
            if let Some(tool) = graph.tool_mut(input.tool) {
                tool.set_state(ToolState::Stale);
            }
            out_of_date.insert(input.tool);
        }
        out_of_date.extend(graph.drain_propagations(limit));
    }
}

/// Whether every active input is settled
fn is_ready(graph: &Graph, id: ToolId) -> bool {
    graph.tool(id).is_some_and(|tool| {
        tool.ports().inputs().all(|input| match input.connection() {
            None => true,
            Some(c) => c.is_up_to_date() || c.error().is_some(),
        })
    })
}

/// Propagate a finished tool's outputs downstream
fn complete(
    graph: &mut Graph,
    id: ToolId,
    index: &Dependents,
    out_of_date: &mut HashSet<ToolId>,
    limit: usize,
) {
    let Some(tool) = graph.tool(id) else {
        return;
    };
    let source_name = tool.name().to_string();
    let outputs: Vec<Output> = tool.ports().outputs().cloned().collect();
    let active: HashSet<&str> = outputs.iter().map(|o| o.name()).collect();

    for output in &outputs {
        let Some(inputs) = index.get(&output.to_ref()) else {
            continue;
        };
        for (input, is_active) in inputs {
            let Some(dependent) = graph.tool_mut(input.tool) else {
                continue;
            };
            if !is_active {
                // Pulled when the input is shown again
                if let Some(connection) = dependent
                    .ports_mut()
                    .input_mut(&input.name)
                    .and_then(|i| i.connection.as_mut())
                {
                    connection.up_to_date = false;
                }
                continue;
            }
            if let Err(e) = dependent.propagate_input_value(input, &source_name, output) {
                log::warn!("Failed to propagate {}.{}: {}", source_name, output.name(), e);
                continue;
            }
            let errored = dependent
                .ports()
                .input(&input.name)
                .is_some_and(|i| i.connection_error().is_some());
            if errored {
                dependent.set_state(ToolState::BadInputs);
            }
            out_of_date.insert(input.tool);
        }
    }

    for (output, inputs) in index {
        if output.tool != id || active.contains(output.name.as_str()) {
            continue;
        }
        for (input, _) in inputs.iter().filter(|(_, is_active)| *is_active) {
            let message = format!(
                "Connected output {}.{} no longer exists",
                source_name, output.name
            );
            graph.set_connection_error(input, message);
            if let Some(dependent) = graph.tool_mut(input.tool) {
                dependent.set_state(ToolState::BadInputs);
            }
            out_of_date.insert(input.tool);
        }
    }

    out_of_date.extend(graph.drain_propagations(limit));
    refresh_lagging(graph, out_of_date, limit);
}

enum Round {
    Run(Vec<PreparedRun>),
    Settled,
    Superseded,
}

/// Run one update pass for `generation`
pub(crate) async fn run_pass(inner: Arc<ManagerInner>, generation: u64) {
    let limit = inner.config.max_propagation_rounds;

    // Phases 1 and 2
    let start = {
        let mut graph = inner.graph.lock();
        if graph.generation != generation {
            None
        } else {
            let changes = graph.pending.take();
            let mut out_of_date = seed(&mut graph, changes);
            close_over_dependents(&mut graph, &mut out_of_date, limit);
            let names = tool_names(&graph, &out_of_date);
            let max_runs = graph.tools().len().max(1);
            Some((out_of_date, max_runs, names))
        }
    };
    let Some((mut out_of_date, max_runs, names)) = start else {
        log::debug!("Update {} superseded before starting", generation);
        inner.emit(vec![GraphEvent::UpdateSuperseded { generation }]);
        return;
    };
    log::debug!("Update {} out of date: {:?}", generation, names);
    inner.emit(vec![GraphEvent::UpdateStarted {
        generation,
        tools: names,
    }]);

    // Phase 3
    let mut runs: HashMap<ToolId, usize> = HashMap::new();
    loop {
        let mut events = Vec::new();
        let round = {
            let mut graph = inner.graph.lock();
            if graph.generation != generation {
                Round::Superseded
            } else {
                out_of_date.retain(|id| graph.tool(*id).is_some());
                let eligible: Vec<ToolId> = graph
                    .tools()
                    .iter()
                    .map(|t| t.id())
                    .filter(|id| out_of_date.contains(id))
                    .filter(|id| runs.get(id).copied().unwrap_or(0) < max_runs)
                    .filter(|id| is_ready(&graph, *id))
                    .collect();

                if eligible.is_empty() {
                    Round::Settled
                } else {
                    let index = dependents(&graph);
                    let mut prepared = Vec::new();
                    for id in eligible {
                        out_of_date.remove(&id);
                        *runs.entry(id).or_default() += 1;
                        let Some(tool) = graph.tool_mut(id) else {
                            continue;
                        };
                        let name = tool.name().to_string();
                        match tool.begin_run() {
                            Some(run) => {
                                events.push(GraphEvent::ToolStarted {
                                    generation,
                                    tool: name,
                                });
                                prepared.push(run);
                            }
                            None => {
                                events.push(GraphEvent::ToolFinished {
                                    generation,
                                    tool: name,
                                    state: tool.state(),
                                    error: tool.error().map(str::to_string),
                                });
                                complete(&mut graph, id, &index, &mut out_of_date, limit);
                            }
                        }
                    }
                    Round::Run(prepared)
                }
            }
        };
        inner.emit(events);

        let prepared = match round {
            Round::Run(prepared) => prepared,
            Round::Settled => break,
            Round::Superseded => {
                log::debug!("Update {} superseded", generation);
                inner.emit(vec![GraphEvent::UpdateSuperseded { generation }]);
                return;
            }
        };

        let mut running: FuturesUnordered<_> =
            prepared.into_iter().map(PreparedRun::execute).collect();
        while let Some((id, result)) = running.next().await {
            let event = {
                let mut graph = inner.graph.lock();
                if graph.generation != generation {
                    None
                } else {
                    let committed = graph.tool_mut(id).map(|tool| tool.finish_run(result));
                    let mut event = Vec::new();
                    if committed == Some(true) {
                        let index = dependents(&graph);
                        complete(&mut graph, id, &index, &mut out_of_date, limit);
                        if let Some(tool) = graph.tool(id) {
                            event.push(GraphEvent::ToolFinished {
                                generation,
                                tool: tool.name().to_string(),
                                state: tool.state(),
                                error: tool.error().map(str::to_string),
                            });
                        }
                    }
                    Some(event)
                }
            };
            match event {
                Some(event) => inner.emit(event),
                None => {
                    log::debug!("Update {} superseded while running", generation);
                    inner.emit(vec![GraphEvent::UpdateSuperseded { generation }]);
                    return;
                }
            }
        }
    }

    // Phase 4
    let events = {
        let mut graph = inner.graph.lock();
        if graph.generation != generation {
            vec![GraphEvent::UpdateSuperseded { generation }]
        } else {
            let mut events = Vec::new();
            let remaining = tool_names(&graph, &out_of_date);
            for id in &out_of_date {
                if let Some(tool) = graph.tool_mut(*id) {
                    tool.mark_cycle();
                }
            }
            if !remaining.is_empty() {
                log::debug!("Update {} left unresolved: {:?}", generation, remaining);
                events.push(GraphEvent::CycleDetected {
                    generation,
                    tools: remaining,
                });
            }
            events.push(GraphEvent::UpdateSettled { generation });
            events
        }
    };
    inner.emit(events);
}

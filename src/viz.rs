//! Graph visualization output: a Mermaid flowchart, optionally wrapped in
//! a standalone HTML page. Critical-path, done, and in-progress tasks get
//! distinct style classes.

use crate::cpm::CpmResult;
use crate::models::{id_suffix, Task};
use crate::state::Project;

fn sorted_tasks(project: &Project) -> Vec<&Task> {
    let mut tasks: Vec<&Task> = project.tasks.values().collect();
    tasks.sort_by_key(|t| id_suffix(&t.id).unwrap_or(u64::MAX));
    tasks
}

/// Render the dependency graph as a Mermaid `flowchart LR` body.
pub fn mermaid_flowchart(project: &Project, cpm: Option<&CpmResult>, hide_done: bool) -> String {
    let mut lines: Vec<String> = vec!["flowchart LR".to_string()];

    lines.push("    classDef done fill:#2d6a4f,stroke:#1b4332,color:#d8f3dc".to_string());
    lines.push("    classDef inprog fill:#e76f51,stroke:#f4a261,color:#fff".to_string());
    lines.push(
        "    classDef crit fill:#d4a373,stroke:#e76f51,color:#000,stroke-width:3px".to_string(),
    );
    lines.push("    classDef flex fill:#6c757d,stroke:#495057,color:#f8f9fa".to_string());
    lines.push("    classDef default fill:#457b9d,stroke:#1d3557,color:#f1faee".to_string());

    let visible = |task: &Task| !(hide_done && task.status.is_done());

    for task in sorted_tasks(project) {
        if !visible(task) {
            continue;
        }
        let label = task.name.replace('"', "'");
        lines.push(format!(
            "    {}[\"{}: {}<br/>{:.1}h\"]",
            task.id, task.id, label, task.duration_hrs
        ));
    }

    for task in sorted_tasks(project) {
        if !visible(task) {
            continue;
        }
        for dep in &task.depends_on {
            match project.tasks.get(dep) {
                Some(dep_task) if visible(dep_task) => {
                    lines.push(format!("    {} --> {}", dep, task.id));
                }
                _ => {}
            }
        }
    }

    let mut done_ids: Vec<&str> = Vec::new();
    let mut inprog_ids: Vec<&str> = Vec::new();
    let mut crit_ids: Vec<&str> = Vec::new();
    let mut flex_ids: Vec<&str> = Vec::new();
    for task in sorted_tasks(project) {
        if !visible(task) {
            continue;
        }
        if task.status.is_done() {
            done_ids.push(&task.id);
        } else if task.status.is_in_progress() {
            inprog_ids.push(&task.id);
        } else if task.flexible {
            flex_ids.push(&task.id);
        } else if cpm.and_then(|c| c.get(&task.id)).map(|s| s.critical) == Some(true) {
            crit_ids.push(&task.id);
        }
    }
    for (class, ids) in [
        ("done", done_ids),
        ("inprog", inprog_ids),
        ("crit", crit_ids),
        ("flex", flex_ids),
    ] {
        if !ids.is_empty() {
            lines.push(format!("    class {} {}", ids.join(","), class));
        }
    }

    lines.join("\n")
}

/// The flowchart fenced for a Markdown file.
pub fn mermaid_markdown(project: &Project, cpm: Option<&CpmResult>, hide_done: bool) -> String {
    format!(
        "```mermaid\n{}\n```\n",
        mermaid_flowchart(project, cpm, hide_done)
    )
}

/// A self-contained HTML page rendering the same graph in the browser.
pub fn html_page(project: &Project, cpm: Option<&CpmResult>, hide_done: bool) -> String {
    let graph = mermaid_flowchart(project, cpm, hide_done);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>DAGr task graph</title>
<style>
  body {{ font-family: sans-serif; margin: 2rem; background: #1d2021; color: #f1faee; }}
  h1 {{ font-size: 1.2rem; }}
</style>
</head>
<body>
<h1>Task graph</h1>
<pre class="mermaid">
{graph}
</pre>
<script type="module">
  import mermaid from "https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.esm.min.mjs";
  mermaid.initialize({{ startOnLoad: true, theme: "dark" }});
</script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpm::calculate_schedule;
    use crate::models::{ProjectConfig, Status};
    use crate::state::NewTask;
    use chrono::NaiveDate;

    fn project() -> Project {
        let start = NaiveDate::from_ymd_opt(2026, 2, 23)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut p = Project::new(ProjectConfig::new(start));
        p.add_task(NewTask {
            name: "Collect \"raw\" data".to_string(),
            duration_hrs: 4.0,
            ..NewTask::default()
        })
        .unwrap();
        p.add_task(NewTask {
            name: "Analyze".to_string(),
            duration_hrs: 2.0,
            depends_on: vec!["T-1".to_string()],
            ..NewTask::default()
        })
        .unwrap();
        p
    }

    #[test]
    fn test_flowchart_nodes_edges_and_classes() {
        let p = project();
        let cpm = calculate_schedule(&p.tasks, &p.config).unwrap();
        let out = mermaid_flowchart(&p, Some(&cpm), false);
        assert!(out.starts_with("flowchart LR"));
        assert!(out.contains("T-1 --> T-2"));
        // Quotes in names must not break the node syntax
        assert!(out.contains("T-1: Collect 'raw' data"));
        // The whole chain is critical
        assert!(out.contains("class T-1,T-2 crit"));
    }

    #[test]
    fn test_hide_done_drops_nodes_and_edges() {
        let mut p = project();
        p.tasks.get_mut("T-1").unwrap().status = Status::Done {
            started_at: None,
            finished_at: NaiveDate::from_ymd_opt(2026, 2, 23)
                .unwrap()
                .and_hms_opt(13, 0, 0)
                .unwrap(),
        };
        let out = mermaid_flowchart(&p, None, true);
        assert!(!out.contains("T-1[\""));
        assert!(!out.contains("T-1 --> T-2"));
        assert!(out.contains("T-2[\""));
    }

    #[test]
    fn test_html_page_embeds_graph() {
        let p = project();
        let out = html_page(&p, None, false);
        assert!(out.contains("<!DOCTYPE html>"));
        assert!(out.contains("flowchart LR"));
        assert!(out.contains("mermaid.initialize"));
    }
}

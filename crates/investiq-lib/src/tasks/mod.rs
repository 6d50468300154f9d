//! Analysis tasks described as data: an instruction plus the JSON shape the
//! answer must take. One generic agent run executes any of them.

pub mod orchestrator;
pub mod shape;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::OutputContract;
use crate::agent::json::extract_json;

pub use orchestrator::{AnalysisReport, ChatReply, Orchestrator};
pub use shape::{Field, Shape};

/// Value the model must use for fields it could not find.
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// System instructions shared by every task agent.
pub const ANALYST_INSTRUCTIONS: &str = "You are an AI investment analyst assistant.
You are provided with the following tools:
- web_search: to search the web for any specific information.
- retrieve_data: to get the company specific data from the local database. This database is loaded from the pitch deck provided by the company.
You will be given a task. Retrieve the information about the company with the retrieve_data tool and use the web_search tool to find any specific information on the web.
If retrieve_data returns an empty list, no pitch deck has been loaded: rely on web_search alone.
Make sure to complete the task thoroughly and answer only with the requested JSON.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub instruction: String,
    pub schema: Shape,
}

impl TaskDefinition {
    pub fn new(name: &str, instruction: &str, schema: Shape) -> Self {
        Self {
            name: name.to_string(),
            instruction: instruction.to_string(),
            schema,
        }
    }

    /// The user prompt: instruction, example answer, formatting rules.
    pub fn render_prompt(&self) -> String {
        let example = serde_json::to_string_pretty(&self.schema.example())
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "{instruction}\n\nBased on the research, provide a json format response as below.\n```json\n{example}\n```\nStrictly follow the json format and do not miss any information. If the tools return nothing for a field, set it to \"{INSUFFICIENT_DATA}\" instead of guessing.",
            instruction = self.instruction.trim(),
        )
    }
}

impl OutputContract for TaskDefinition {
    fn accept(&self, text: &str) -> Result<Value, String> {
        let value = extract_json(text)?;
        self.schema.validate(&value)?;
        Ok(value)
    }
}

/// Ordered set of task definitions, unique by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCatalog {
    tasks: Vec<TaskDefinition>,
}

impl TaskCatalog {
    /// The five built-in analyses in their canonical run order.
    pub fn builtin() -> Self {
        Self {
            tasks: vec![
                founder_profile(),
                industry_analysis(),
                technology_analysis(),
                revenue_stream(),
                competitor_analysis(),
            ],
        }
    }

    /// Built-in tasks overlaid with definitions from a JSON array file.
    /// A definition with a built-in name replaces it in place; new names are
    /// appended.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file {}", path.display()))?;
        let extra: Vec<TaskDefinition> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse task file {}", path.display()))?;

        let mut seen = HashSet::new();
        for task in &extra {
            anyhow::ensure!(!task.name.trim().is_empty(), "task names must not be empty");
            anyhow::ensure!(
                seen.insert(task.name.as_str()),
                "task '{}' defined twice in {}",
                task.name,
                path.display()
            );
        }

        let mut catalog = Self::builtin();
        for task in extra {
            catalog.upsert(task);
        }
        Ok(catalog)
    }

    fn upsert(&mut self, task: TaskDefinition) {
        match self.tasks.iter_mut().find(|t| t.name == task.name) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    /// Definitions for `names` in the given order; every name must exist.
    pub fn select(&self, names: &[String]) -> anyhow::Result<Vec<TaskDefinition>> {
        names
            .iter()
            .map(|name| {
                self.get(name).cloned().with_context(|| {
                    format!(
                        "unknown task '{name}' (available: {})",
                        self.names().join(", ")
                    )
                })
            })
            .collect()
    }
}

fn sourced(hint: &str) -> Shape {
    Shape::object(vec![
        ("data", Shape::text(hint)),
        ("data_source_url", Shape::text("<url>")),
    ])
}

fn founder_profile() -> TaskDefinition {
    TaskDefinition::new(
        "founder_profile",
        "Perform founder profile analysis of the company. Mention education, work experience, any previously founded companies, etc. Use LinkedIn and other web sources to identify each founder and their profile.
The json must contain one entry for every founder mentioned in the company data.
Your task is completed after you search the web and identify information for all the founders.",
        Shape::map(
            "Founder",
            Shape::object(vec![
                ("name", Shape::text("text")),
                ("education", Shape::text("text")),
                ("work_experience", Shape::text("text")),
                ("previously_founded_companies", Shape::text("text")),
            ]),
        ),
    )
}

fn industry_analysis() -> TaskDefinition {
    TaskDefinition::new(
        "industry_analysis",
        "Perform industry and market analysis of the company.
Step 1: Identify the industry of the company and its market size using the retrieve_data tool.
Step 2: Research the identified industry with the web_search tool on market size, growth potential, key risks and challenges, recent news, growth strategy and plans. Verify the market size from the web and compare it with the market size from the company data.
All the information should come from the web; provide the website url for every entry.",
        Shape::object(vec![
            ("industry", sourced("text")),
            ("market_size", sourced("text")),
            ("recent_news", sourced("text")),
            ("growth_potential", sourced("text")),
            ("key_risks_and_challenges", sourced("text")),
            ("growth_strategy_and_plans", sourced("text")),
        ]),
    )
}

fn technology_analysis() -> TaskDefinition {
    TaskDefinition::new(
        "technology_analysis",
        "Perform technology analysis of the company.
Step 1: Identify the core technologies of the company using the retrieve_data tool.
Step 2: Research with the web_search tool which other industries use the same technology and their market size. Verify market sizes from the web.
All the information should come from the web; provide the website url for every industry.",
        Shape::object(vec![
            ("technology", Shape::text("text")),
            (
                "industries_using_technology",
                Shape::list(Shape::object(vec![
                    ("industry", Shape::text("text")),
                    ("market_size", Shape::text("text")),
                    ("data_source_url", Shape::text("<url>")),
                ])),
            ),
        ]),
    )
}

fn revenue_stream() -> TaskDefinition {
    TaskDefinition::new(
        "revenue_stream",
        "From the company data, clearly define all sources of revenue. For each stream include its name, a description, the target audience (who is paying) and its share of total revenue if available.",
        Shape::object(vec![(
            "revenue_streams",
            Shape::list(Shape::object(vec![
                (
                    "name",
                    Shape::text("<Name of the revenue stream, e.g. Subscription Fees, Commission, Product Sales>"),
                ),
                ("description", Shape::text("<Description of the revenue stream>")),
                ("target_audience", Shape::text("<Who is paying?>")),
                (
                    "percentage_contribution",
                    Shape::text("<Share of total revenue, if available>"),
                ),
            ])),
        )]),
    )
}

fn competitor_analysis() -> TaskDefinition {
    let competitor = Shape::object(
        [
            ("company_name", "<Name of the competitor>"),
            ("headquarters", "<Headquarters of the competitor>"),
            ("founding_year", "<Founding year>"),
            ("total_funding_raised", "<Total funding raised>"),
            ("funding_rounds", "<Number of funding rounds>"),
            ("investors", "<Investors>"),
            ("revenue_streams", "<Revenue streams>"),
            ("business_model", "<Business model>"),
            ("gross_margin", "<Gross margin>"),
            ("net_margin", "<Net margin>"),
            ("current_arr", "<Current ARR>"),
            ("current_mrr", "<Current MRR>"),
            ("arr_growth_rate", "<ARR growth rate>"),
            ("churn_rate", "<Churn rate>"),
            (
                "differentiating_factors",
                "<How the company differs from this competitor>",
            ),
        ]
        .into_iter()
        .map(|(name, hint)| (name, Shape::text(hint)))
        .collect(),
    );
    TaskDefinition::new(
        "competitor_analysis",
        "Perform competitor analysis covering 2-3 competitors operating a similar or more advanced revenue model than the company.
Step 1: Identify the competitors of the company using the retrieve_data tool if available.
Step 2: Identify the revenue model, technology used and target audience of the company.
Step 3: Use the web_search tool to find the competitors and their information.",
        Shape::object(vec![("competitors", Shape::list(competitor))]),
    )
}

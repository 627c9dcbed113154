mod pipeline_scenarios;
mod support;

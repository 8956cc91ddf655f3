//! Signature skeletons seeded into write and correction conversations.

use crate::domain::models::{ArtifactKind, MappingPlan};

/// Root interface of a possibly nested shape name (`IOrder.ICreate` -> `IOrder`).
fn root_interface(shape_name: &str) -> &str {
    shape_name.split('.').next().unwrap_or(shape_name)
}

/// Skeleton of the artifact `plan` produces, with bodies left to the agent.
pub fn signature(plan: &MappingPlan) -> String {
    let name = plan.entry_point_name();
    let shape = &plan.target_shape_name;
    let entity = plan.entity_schema_name.as_deref().unwrap_or("unknown");
    let import = format!(
        "import {{ {root} }} from \"../api/structures/{root}\";",
        root = root_interface(shape)
    );

    match plan.kind {
        ArtifactKind::Transformer => format!(
            r#"import {{ Prisma }} from "@prisma/client";
{import}

export namespace {name} {{
  export function select() {{
    return {{
      // columns and relations of `{entity}` needed by transform()
    }} satisfies Prisma.{entity}FindManyArgs;
  }}

  export async function transform(
    input: Prisma.{entity}GetPayload<ReturnType<typeof select>>,
  ): Promise<{shape}> {{
    // one property per member of {shape}
  }}
}}
"#
        ),
        ArtifactKind::Collector => {
            let mut props = vec![format!("    body: {shape};")];
            for reference in &plan.references {
                props.push(format!(
                    "    {}: {{ id: string }}; // {} ({})",
                    reference.name, reference.entity_schema_name, reference.source
                ));
            }
            format!(
                r#"import {{ Prisma }} from "@prisma/client";
{import}

export namespace {name} {{
  export async function collect(props: {{
{props}
  }}): Promise<Prisma.{entity}CreateInput> {{
    // one property per column and relation of `{entity}`
  }}
}}
"#,
                props = props.join("\n")
            )
        }
    }
}

#![allow(dead_code)]

use oxide_schemadiff::prelude::*;

/// The university model, with the student entity named `student_entity`.
///
/// Table, junction and key names follow the entity name, so
/// `university_named("Pupil")` is what a `Student -> Pupil` rename produces.
pub fn university_named(student_entity: &str) -> Model {
    let student = student_entity.to_lowercase();
    let junction = format!("course_{student}");

    let department = TableSchema::new("department")
        .column(
            ColumnSchema::new("number", SqlType::Integer)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSchema::new("name", SqlType::Varchar(100)).not_null());

    let group = TableSchema::new("group")
        .column(ColumnSchema::new("number", SqlType::Integer).primary_key())
        .column(ColumnSchema::new("major", SqlType::Text).not_null())
        .column(ColumnSchema::new("dept", SqlType::Integer).not_null())
        .index(IndexSchema::new("idx_group__dept", &["dept"]))
        .foreign_key(ForeignKeySchema::new(
            "fk_group__dept",
            &["dept"],
            "department",
            &["number"],
        ));

    let course = TableSchema::new("course")
        .column(ColumnSchema::new("name", SqlType::Text).primary_key())
        .column(ColumnSchema::new("semester", SqlType::Integer).primary_key())
        .column(ColumnSchema::new("lect_hours", SqlType::Integer).not_null())
        .column(ColumnSchema::new("description", SqlType::Text))
        .column(ColumnSchema::new("dept", SqlType::Integer).not_null())
        .index(IndexSchema::new("idx_course__dept", &["dept"]))
        .foreign_key(ForeignKeySchema::new(
            "fk_course__dept",
            &["dept"],
            "department",
            &["number"],
        ))
        .trigger(TriggerSchema::new(
            "trg_course__touch",
            TriggerTiming::Before,
            &[TriggerEvent::Update],
            "touch_course()",
        ));

    let student_table = TableSchema::new(student.as_str())
        .column(
            ColumnSchema::new("id", SqlType::Integer)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSchema::new("name", SqlType::Text).not_null())
        .column(
            ColumnSchema::new("tel", SqlType::Text)
                .not_null()
                .default(Value::String(String::new())),
        )
        .column(ColumnSchema::new("group", SqlType::Integer).not_null())
        .index(IndexSchema::new(format!("idx_{student}__group"), &["group"]))
        .foreign_key(ForeignKeySchema::new(
            format!("fk_{student}__group"),
            &["group"],
            "group",
            &["number"],
        ));

    let teacher = TableSchema::new("teacher")
        .column(
            ColumnSchema::new("id", SqlType::Integer)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSchema::new("name", SqlType::Text).not_null())
        .column(ColumnSchema::new("classtype", SqlType::Text).not_null())
        .column(ColumnSchema::new("directs", SqlType::Integer))
        .foreign_key(ForeignKeySchema::new(
            "fk_teacher__directs",
            &["directs"],
            "department",
            &["number"],
        ));

    let course_students = TableSchema::new(junction.as_str())
        .column(ColumnSchema::new("course_name", SqlType::Text).primary_key())
        .column(ColumnSchema::new("course_semester", SqlType::Integer).primary_key())
        .column(ColumnSchema::new(student.as_str(), SqlType::Integer).primary_key())
        .index(IndexSchema::new(
            format!("idx_{junction}__{student}"),
            &[student.as_str()],
        ))
        .foreign_key(ForeignKeySchema::new(
            format!("fk_{junction}__course_name_course_semester"),
            &["course_name", "course_semester"],
            "course",
            &["name", "semester"],
        ))
        .foreign_key(ForeignKeySchema::new(
            format!("fk_{junction}__{student}"),
            &[student.as_str()],
            student.as_str(),
            &["id"],
        ))
        .m2m(vec![
            AttrRef::new("Course", "students"),
            AttrRef::new(student_entity, "courses"),
        ]);

    let entities = vec![
        Entity::new("Department", "department")
            .attribute(Attribute::simple("number", AttrKind::PrimaryKey))
            .attribute(Attribute::simple("name", AttrKind::Required))
            .attribute(Attribute::new("groups", AttrKind::Set))
            .attribute(Attribute::new("courses", AttrKind::Set)),
        Entity::new("Group", "group")
            .attribute(Attribute::simple("number", AttrKind::PrimaryKey))
            .attribute(Attribute::simple("major", AttrKind::Required))
            .attribute(Attribute::simple("dept", AttrKind::Required))
            .attribute(Attribute::new("students", AttrKind::Set)),
        Entity::new("Course", "course")
            .attribute(Attribute::simple("name", AttrKind::PrimaryKey))
            .attribute(Attribute::simple("semester", AttrKind::PrimaryKey))
            .attribute(Attribute::simple("lect_hours", AttrKind::Required))
            .attribute(Attribute::simple("description", AttrKind::Optional))
            .attribute(Attribute::simple("dept", AttrKind::Required))
            .attribute(Attribute::new("students", AttrKind::Set)),
        Entity::new(student_entity, student.as_str())
            .attribute(Attribute::simple("id", AttrKind::PrimaryKey))
            .attribute(Attribute::simple("name", AttrKind::Required))
            .attribute(Attribute::simple("tel", AttrKind::Optional))
            .attribute(Attribute::simple("group", AttrKind::Required))
            .attribute(Attribute::new("courses", AttrKind::Set)),
        Entity::new("Teacher", "teacher")
            .attribute(Attribute::simple("id", AttrKind::PrimaryKey))
            .attribute(Attribute::simple("name", AttrKind::Required))
            .attribute(Attribute::simple("classtype", AttrKind::Discriminator)),
        Entity::new("DeptDirector", "teacher")
            .base("Teacher")
            .attribute(Attribute::simple("directs", AttrKind::Optional)),
    ];

    let snapshot = SchemaSnapshot::new()
        .table(department)
        .table(group)
        .table(course)
        .table(student_table)
        .table(teacher)
        .table(course_students);

    Model::new(entities, snapshot)
}

/// The university model as first deployed.
pub fn university() -> Model {
    university_named("Student")
}

/// Adds `CourseMark` with a required course and an optional student
/// reference. `student_table` is the current name of the student table.
pub fn add_course_mark(model: &mut Model, student_table: &str) {
    let table = TableSchema::new("coursemark")
        .column(
            ColumnSchema::new("id", SqlType::Integer)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSchema::new("course_name", SqlType::Text).not_null())
        .column(ColumnSchema::new("course_semester", SqlType::Integer).not_null())
        .column(ColumnSchema::new("student", SqlType::Integer))
        .index(IndexSchema::new(
            "idx_coursemark__course_name_course_semester",
            &["course_name", "course_semester"],
        ))
        .index(IndexSchema::new("idx_coursemark__student", &["student"]))
        .foreign_key(ForeignKeySchema::new(
            "fk_coursemark__course_name_course_semester",
            &["course_name", "course_semester"],
            "course",
            &["name", "semester"],
        ))
        .foreign_key(
            ForeignKeySchema::new("fk_coursemark__student", &["student"], student_table, &["id"])
                .on_delete(ForeignKeyAction::SetNull),
        );

    model.entities.push(
        Entity::new("CourseMark", "coursemark")
            .attribute(Attribute::simple("id", AttrKind::PrimaryKey))
            .attribute(
                Attribute::new("course", AttrKind::Required)
                    .column("course_name")
                    .column("course_semester"),
            )
            .attribute(Attribute::new("student", AttrKind::Optional).column("student")),
    );
    entity_mut(model, "Course")
        .attributes
        .push(Attribute::new("marks", AttrKind::Set));
    model.snapshot.tables.push(table);
}

pub fn entity_mut<'a>(model: &'a mut Model, name: &str) -> &'a mut Entity {
    model
        .entities
        .iter_mut()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("no entity {name}"))
}

pub fn attribute_mut<'a>(model: &'a mut Model, entity: &str, name: &str) -> &'a mut Attribute {
    entity_mut(model, entity)
        .attributes
        .iter_mut()
        .find(|a| a.name == name)
        .unwrap_or_else(|| panic!("no attribute {entity}.{name}"))
}

pub fn remove_attribute(model: &mut Model, entity: &str, name: &str) {
    entity_mut(model, entity).attributes.retain(|a| a.name != name);
}

pub fn table_mut<'a>(model: &'a mut Model, name: &str) -> &'a mut TableSchema {
    model
        .snapshot
        .get_table_mut(name)
        .unwrap_or_else(|| panic!("no table {name}"))
}

pub fn column_mut<'a>(model: &'a mut Model, table: &str, name: &str) -> &'a mut ColumnSchema {
    table_mut(model, table)
        .get_column_mut(name)
        .unwrap_or_else(|| panic!("no column {table}.{name}"))
}

pub fn diff_with(
    dialect: impl MigrationDialect + 'static,
    prev: &Model,
    new: &Model,
    hints: &RenameHints,
) -> Vec<Operation> {
    SchemaDiffer::new(dialect)
        .diff(prev, new, hints)
        .unwrap_or_else(|e| panic!("diff failed: {e}"))
}

pub fn diff(prev: &Model, new: &Model) -> Vec<Operation> {
    diff_with(PostgresDialect::new(), prev, new, &RenameHints::new())
}

pub fn statements(ops: &[Operation]) -> Vec<String> {
    ops.iter().map(Operation::statement).collect()
}

mod common;

use common::*;
use oxide_schemadiff::correlate::correlate;
use oxide_schemadiff::prelude::*;

// ===================================================================
// Identity
// ===================================================================

#[test]
fn test_self_diff_is_empty_for_every_dialect() {
    let model = university();
    let hints = RenameHints::new();
    assert!(diff_with(PostgresDialect::new(), &model, &model, &hints).is_empty());
    assert!(diff_with(SqliteDialect::new(), &model, &model, &hints).is_empty());
    assert!(diff_with(OracleDialect::new(), &model, &model, &hints).is_empty());
}

#[test]
fn test_correlation_links_are_symmetric() {
    let hints = RenameHints::new().rename_entity("Student", "Pupil");
    let corr = correlate(&university(), &university_named("Pupil"), &hints).unwrap();

    assert_eq!(corr.table_new("student"), Some("pupil"));
    assert_eq!(corr.table_prev("pupil"), Some("student"));
    assert_eq!(corr.table_new("course_student"), Some("course_pupil"));
    assert_eq!(
        corr.column_new("course_student", "student"),
        Some(&("course_pupil".to_string(), "pupil".to_string()))
    );
    assert_eq!(
        corr.object_new(ObjectKind::ForeignKey, "fk_student__group"),
        Some("fk_pupil__group")
    );

    for (prev, new) in corr.tables.iter() {
        assert_eq!(corr.tables.prev_of(new), Some(prev));
    }
    for (prev, new) in corr.columns.iter() {
        assert_eq!(corr.columns.prev_of(new), Some(prev));
    }
    for (prev, new) in corr.objects.iter() {
        assert_eq!(corr.objects.prev_of(new), Some(prev));
    }
}

// ===================================================================
// Renames
// ===================================================================

#[test]
fn test_entity_rename_renames_table_keys_indexes_and_junction() {
    let hints = RenameHints::new().rename_entity("Student", "Pupil");
    let ops = diff_with(
        PostgresDialect::new(),
        &university(),
        &university_named("Pupil"),
        &hints,
    );

    assert!(ops.iter().all(|op| op.kind == OpKind::Rename));
    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"student\" RENAME TO \"pupil\"",
            "ALTER TABLE \"pupil\" RENAME CONSTRAINT \"fk_student__group\" TO \"fk_pupil__group\"",
            "ALTER INDEX \"idx_student__group\" RENAME TO \"idx_pupil__group\"",
            "ALTER TABLE \"course_student\" RENAME TO \"course_pupil\"",
            "ALTER TABLE \"course_pupil\" RENAME COLUMN \"student\" TO \"pupil\"",
            "ALTER TABLE \"course_pupil\" RENAME CONSTRAINT \
             \"fk_course_student__course_name_course_semester\" TO \
             \"fk_course_pupil__course_name_course_semester\"",
            "ALTER TABLE \"course_pupil\" RENAME CONSTRAINT \"fk_course_student__student\" \
             TO \"fk_course_pupil__pupil\"",
            "ALTER INDEX \"idx_course_student__student\" RENAME TO \"idx_course_pupil__pupil\"",
        ]
    );
}

#[test]
fn test_attribute_rename_renames_column_and_foreign_key() {
    let mut new = university();
    attribute_mut(&mut new, "DeptDirector", "directs").name = "heads".to_string();
    attribute_mut(&mut new, "DeptDirector", "heads").columns = vec!["heads".to_string()];
    column_mut(&mut new, "teacher", "directs").name = "heads".to_string();
    let fk = &mut table_mut(&mut new, "teacher").foreign_keys[0];
    fk.name = "fk_teacher__heads".to_string();
    fk.columns = vec!["heads".to_string()];

    let hints = RenameHints::new().rename_attribute("DeptDirector", "directs", "heads");
    let ops = diff_with(PostgresDialect::new(), &university(), &new, &hints);

    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"teacher\" RENAME COLUMN \"directs\" TO \"heads\"",
            "ALTER TABLE \"teacher\" RENAME CONSTRAINT \"fk_teacher__directs\" TO \"fk_teacher__heads\"",
        ]
    );
}

#[test]
fn test_rename_hint_for_unknown_entity_fails() {
    let hints = RenameHints::new().rename_entity("Ghost", "Pupil");
    let err = SchemaDiffer::new(PostgresDialect::new())
        .diff(&university(), &university_named("Pupil"), &hints)
        .unwrap_err();
    assert!(matches!(err, MigrationError::UnknownEntity { side: "previous", .. }));
}

#[test]
fn test_dependent_drops_use_previous_names_before_renames() {
    let mut new = university_named("Pupil");
    table_mut(&mut new, "pupil").indexes.clear();

    let hints = RenameHints::new().rename_entity("Student", "Pupil");
    let ops = diff_with(PostgresDialect::new(), &university(), &new, &hints);
    let sql = statements(&ops);

    assert_eq!(sql[0], "DROP INDEX \"idx_student__group\"");
    assert_eq!(sql[1], "ALTER TABLE \"student\" RENAME TO \"pupil\"");
    assert!(!sql.iter().any(|s| s.contains("idx_pupil__group")));
}

// ===================================================================
// New entities
// ===================================================================

#[test]
fn test_adding_course_mark_creates_table_indexes_and_foreign_keys() {
    let mut new = university();
    add_course_mark(&mut new, "student");
    let ops = diff(&university(), &new);

    assert!(ops.iter().all(|op| op.kind == OpKind::Create));
    assert_eq!(
        statements(&ops),
        vec![
            "CREATE TABLE \"coursemark\" (\n  \"id\" SERIAL PRIMARY KEY,\n  \
             \"course_name\" TEXT NOT NULL,\n  \"course_semester\" INTEGER NOT NULL,\n  \
             \"student\" INTEGER\n)",
            "CREATE INDEX \"idx_coursemark__course_name_course_semester\" ON \"coursemark\" \
             (\"course_name\", \"course_semester\")",
            "CREATE INDEX \"idx_coursemark__student\" ON \"coursemark\" (\"student\")",
            "ALTER TABLE \"coursemark\" ADD CONSTRAINT \"fk_coursemark__course_name_course_semester\" \
             FOREIGN KEY (\"course_name\", \"course_semester\") REFERENCES \"course\" (\"name\", \"semester\")",
            "ALTER TABLE \"coursemark\" ADD CONSTRAINT \"fk_coursemark__student\" \
             FOREIGN KEY (\"student\") REFERENCES \"student\" (\"id\") ON DELETE SET NULL",
        ]
    );
}

#[test]
fn test_creates_follow_all_drops_and_renames() {
    let mut new = university_named("Pupil");
    add_course_mark(&mut new, "pupil");
    table_mut(&mut new, "course").triggers.clear();

    let hints = RenameHints::new().rename_entity("Student", "Pupil");
    let ops = diff_with(PostgresDialect::new(), &university(), &new, &hints);

    let first_create = ops
        .iter()
        .position(|op| op.kind == OpKind::Create)
        .unwrap();
    let last_rename = ops
        .iter()
        .rposition(|op| op.kind == OpKind::Rename)
        .unwrap();
    assert_eq!(ops[0].statement(), "DROP TRIGGER \"trg_course__touch\" ON \"course\"");
    assert!(last_rename < first_create);
    assert_eq!(ops.iter().filter(|op| op.kind == OpKind::Create).count(), 5);
}

// ===================================================================
// Attribute changes
// ===================================================================

fn with_course_code(model: &mut Model) {
    table_mut(model, "course")
        .columns
        .push(ColumnSchema::new("code", SqlType::Text).not_null());
    entity_mut(model, "Course").attributes.push(
        Attribute::simple("code", AttrKind::Required).initial(Value::String("00.00.00".into())),
    );
}

#[test]
fn test_adding_required_attribute_uses_temporary_default() {
    let mut new = university();
    with_course_code(&mut new);
    let ops = diff(&university(), &new);

    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"course\" ADD COLUMN \"code\" TEXT DEFAULT '00.00.00' NOT NULL",
            "ALTER TABLE \"course\" ALTER COLUMN \"code\" DROP DEFAULT",
        ]
    );
    assert!(!ops.iter().any(|op| op.kind == OpKind::SetDefaults));
}

#[test]
fn test_adding_required_attribute_on_oracle_resets_default_to_null() {
    let mut new = university();
    with_course_code(&mut new);
    let ops = diff_with(OracleDialect::new(), &university(), &new, &RenameHints::new());

    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"course\" ADD \"code\" CLOB DEFAULT '00.00.00' NOT NULL",
            "ALTER TABLE \"course\" MODIFY \"code\" DEFAULT NULL",
        ]
    );
}

#[test]
fn test_changing_max_length_alters_type() {
    let mut new = university();
    column_mut(&mut new, "department", "name").sql_type = SqlType::Varchar(300);

    assert_eq!(
        statements(&diff(&university(), &new)),
        vec!["ALTER TABLE \"department\" ALTER COLUMN \"name\" TYPE VARCHAR(300)"]
    );

    let oracle = diff_with(OracleDialect::new(), &university(), &new, &RenameHints::new());
    assert_eq!(
        statements(&oracle),
        vec!["ALTER TABLE \"department\" MODIFY \"name\" VARCHAR2(300)"]
    );
}

#[test]
fn test_required_relation_becomes_optional() {
    let mut new = university();
    attribute_mut(&mut new, "Student", "group").kind = AttrKind::Optional;
    column_mut(&mut new, "student", "group").nullable = true;

    assert_eq!(
        statements(&diff(&university(), &new)),
        vec!["ALTER TABLE \"student\" ALTER COLUMN \"group\" DROP NOT NULL"]
    );
}

#[test]
fn test_unique_constraint_set_and_unset() {
    let mut unique = university();
    table_mut(&mut unique, "department")
        .constraints
        .push(ConstraintSchema::unique("unq_department__name", &["name"]));

    assert_eq!(
        statements(&diff(&university(), &unique)),
        vec!["ALTER TABLE \"department\" ADD CONSTRAINT \"unq_department__name\" UNIQUE (\"name\")"]
    );
    assert_eq!(
        statements(&diff(&unique, &university())),
        vec!["ALTER TABLE \"department\" DROP CONSTRAINT \"unq_department__name\""]
    );

    let sqlite = diff_with(SqliteDialect::new(), &university(), &unique, &RenameHints::new());
    assert_eq!(
        statements(&sqlite),
        vec!["CREATE UNIQUE INDEX \"unq_department__name\" ON \"department\" (\"name\")"]
    );
}

// ===================================================================
// Optional -> required backfills
// ===================================================================

#[test]
fn test_nullable_optional_becomes_required_with_update_before_set_not_null() {
    let mut new = university();
    {
        let attr = attribute_mut(&mut new, "Course", "description");
        attr.kind = AttrKind::Required;
        attr.initial = Some(Value::String("Empty description".into()));
    }
    column_mut(&mut new, "course", "description").nullable = false;

    let ops = diff(&university(), &new);
    assert_eq!(
        statements(&ops),
        vec![
            "UPDATE \"course\"\nSET \"description\" = 'Empty description'\nWHERE \"description\" IS NULL",
            "ALTER TABLE \"course\" ALTER COLUMN \"description\" SET NOT NULL",
        ]
    );
    assert_eq!(ops[0].kind, OpKind::SetDefaults);
}

#[test]
fn test_required_with_new_sql_default_updates_before_set_not_null() {
    let mut new = university();
    {
        let attr = attribute_mut(&mut new, "Course", "description");
        attr.kind = AttrKind::Required;
        attr.initial = Some(Value::String("Empty".into()));
    }
    {
        let column = column_mut(&mut new, "course", "description");
        column.nullable = false;
        column.default = Some(Value::String("n/a".into()));
    }

    let ops = diff(&university(), &new);
    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"course\" ALTER COLUMN \"description\" SET DEFAULT 'n/a'",
            "UPDATE \"course\"\nSET \"description\" = 'Empty'\nWHERE \"description\" IS NULL",
            "ALTER TABLE \"course\" ALTER COLUMN \"description\" SET NOT NULL",
        ]
    );
    assert_eq!(ops.iter().filter(|op| op.kind == OpKind::SetDefaults).count(), 1);
}

fn with_required_tel(model: &mut Model) {
    {
        let attr = attribute_mut(model, "Student", "tel");
        attr.kind = AttrKind::Required;
        attr.initial = Some(Value::String("000-000-0000".into()));
    }
    column_mut(model, "student", "tel").default = None;
}

#[test]
fn test_optional_string_becomes_required_with_sentinel_backfill() {
    let mut new = university();
    with_required_tel(&mut new);

    let ops = diff(&university(), &new);
    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"student\" ALTER COLUMN \"tel\" DROP DEFAULT",
            "UPDATE \"student\"\nSET \"tel\" = '000-000-0000'\nWHERE (\"tel\" = '' OR \"tel\" IS NULL)",
        ]
    );
    assert_eq!(ops[1].kind, OpKind::SetDefaults);
}

#[test]
fn test_sentinel_can_be_disabled() {
    let mut new = university();
    with_required_tel(&mut new);

    let ops = SchemaDiffer::new(PostgresDialect::new())
        .with_options(DiffOptions {
            empty_string_sentinel: false,
        })
        .diff(&university(), &new, &RenameHints::new())
        .unwrap();
    assert_eq!(
        ops[1].statement(),
        "UPDATE \"student\"\nSET \"tel\" = '000-000-0000'\nWHERE \"tel\" IS NULL"
    );
}

// ===================================================================
// Inheritance
// ===================================================================

#[test]
fn test_adding_derived_entity_adds_discriminator_with_temporary_default() {
    let mut new = university();
    table_mut(&mut new, "student")
        .columns
        .push(ColumnSchema::new("classtype", SqlType::Text).not_null());
    entity_mut(&mut new, "Student").attributes.push(
        Attribute::simple("classtype", AttrKind::Discriminator).initial(Value::String("Student".into())),
    );
    new.entities.push(Entity::new("Graduate", "student").base("Student"));

    let ops = diff(&university(), &new);
    assert_eq!(
        statements(&ops),
        vec![
            "ALTER TABLE \"student\" ADD COLUMN \"classtype\" TEXT DEFAULT 'Student' NOT NULL",
            "ALTER TABLE \"student\" ALTER COLUMN \"classtype\" DROP DEFAULT",
        ]
    );
    assert!(!ops.iter().any(|op| op.kind == OpKind::SetDefaults));
}

// ===================================================================
// Primary keys
// ===================================================================

#[test]
fn test_retyping_a_primary_key_fails() {
    let mut new = university();
    column_mut(&mut new, "department", "number").sql_type = SqlType::BigInt;

    let err = SchemaDiffer::new(PostgresDialect::new())
        .diff(&university(), &new, &RenameHints::new())
        .unwrap_err();
    assert!(matches!(err, MigrationError::PrimaryKeyChange { .. }));
    assert_eq!(err.to_string(), "Cannot change primary key");
}

#[test]
fn test_widening_a_primary_key_fails() {
    let mut new = university();
    entity_mut(&mut new, "Group").primary_key = vec!["number".to_string(), "major".to_string()];
    table_mut(&mut new, "group").primary_key = vec!["number".to_string(), "major".to_string()];

    let err = SchemaDiffer::new(PostgresDialect::new())
        .diff(&university(), &new, &RenameHints::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot change primary key");
}

#[test]
fn test_moving_derived_entity_to_another_hierarchy_fails() {
    let mut new = university();
    entity_mut(&mut new, "DeptDirector").bases = vec!["Student".to_string()];

    let err = SchemaDiffer::new(PostgresDialect::new())
        .diff(&university(), &new, &RenameHints::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot change primary key");
}

// ===================================================================
// Drops
// ===================================================================

#[test]
fn test_dependent_drops_run_in_class_order() {
    let mut new = university();
    table_mut(&mut new, "course").triggers.clear();
    table_mut(&mut new, "group").foreign_keys.clear();
    table_mut(&mut new, "group").indexes.clear();
    remove_attribute(&mut new, "Student", "tel");
    table_mut(&mut new, "student").columns.retain(|c| c.name != "tel");

    assert_eq!(
        statements(&diff(&university(), &new)),
        vec![
            "DROP TRIGGER \"trg_course__touch\" ON \"course\"",
            "ALTER TABLE \"group\" DROP CONSTRAINT \"fk_group__dept\"",
            "DROP INDEX \"idx_group__dept\"",
            "ALTER TABLE \"student\" DROP COLUMN \"tel\"",
        ]
    );
}

#[test]
fn test_dropping_an_entity_drops_its_tables() {
    let mut new = university();
    new.entities.retain(|e| e.name != "Student");
    remove_attribute(&mut new, "Course", "students");
    remove_attribute(&mut new, "Group", "students");
    new.snapshot
        .tables
        .retain(|t| t.name != "student" && t.name != "course_student");

    assert_eq!(
        statements(&diff(&university(), &new)),
        vec![
            "ALTER TABLE \"course_student\" DROP CONSTRAINT \"fk_course_student__student\"",
            "DROP TABLE \"course_student\"",
            "DROP TABLE \"student\"",
        ]
    );
}

// ===================================================================
// SQLite rebuilds
// ===================================================================

#[test]
fn test_sqlite_rebuilds_table_on_nullability_change() {
    let mut new = university();
    attribute_mut(&mut new, "Student", "group").kind = AttrKind::Optional;
    column_mut(&mut new, "student", "group").nullable = true;

    let ops = diff_with(SqliteDialect::new(), &university(), &new, &RenameHints::new());
    let sql = statements(&ops);

    assert_eq!(sql.len(), 5);
    assert!(sql[0].starts_with("CREATE TABLE \"student__new\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,"));
    assert!(sql[0].contains(
        "\"group\" INTEGER,\n  CONSTRAINT \"fk_student__group\" FOREIGN KEY (\"group\") \
         REFERENCES \"group\" (\"number\")"
    ));
    assert_eq!(
        sql[1],
        "INSERT INTO \"student__new\" (\"id\", \"name\", \"tel\", \"group\") \
         SELECT \"id\", \"name\", \"tel\", \"group\" FROM \"student\""
    );
    assert_eq!(sql[2], "DROP TABLE \"student\"");
    assert_eq!(sql[3], "ALTER TABLE \"student__new\" RENAME TO \"student\"");
    assert_eq!(sql[4], "CREATE INDEX \"idx_student__group\" ON \"student\" (\"group\")");
}

fn with_marks(model: &mut Model, student_table: &str) {
    model.snapshot.tables.push(
        TableSchema::new("mark")
            .column(ColumnSchema::new("id", SqlType::Integer).primary_key())
            .column(ColumnSchema::new("student_id", SqlType::Integer).not_null())
            .foreign_key(ForeignKeySchema::new(
                "fk_mark__student_id",
                &["student_id"],
                student_table,
                &["id"],
            )),
    );
}

#[test]
fn test_sqlite_renames_table_before_rebuilding_it() {
    let mut prev = university();
    with_marks(&mut prev, "student");
    let mut new = university_named("Pupil");
    with_marks(&mut new, "pupil");
    attribute_mut(&mut new, "Pupil", "name").kind = AttrKind::Optional;
    column_mut(&mut new, "pupil", "name").nullable = true;

    let hints = RenameHints::new().rename_entity("Student", "Pupil");
    let ops = diff_with(SqliteDialect::new(), &prev, &new, &hints);
    let sql = statements(&ops);

    // Renaming in place makes SQLite rewrite REFERENCES clauses elsewhere.
    assert_eq!(sql[0], "ALTER TABLE \"student\" RENAME TO \"pupil\"");
    assert_eq!(sql[1], "ALTER TABLE \"course_student\" RENAME TO \"course_pupil\"");
    assert!(!sql.iter().any(|s| s.contains("\"mark\"")));
    assert!(!sql.iter().any(|s| s == "DROP TABLE \"student\""));

    let create = sql
        .iter()
        .position(|s| s.starts_with("CREATE TABLE \"pupil__new\""))
        .unwrap();
    assert!(sql[create + 1].starts_with("INSERT INTO \"pupil__new\""));
    assert!(sql[create + 1].ends_with("FROM \"pupil\""));
    assert_eq!(sql[create + 2], "DROP TABLE \"pupil\"");
    assert_eq!(sql[create + 3], "ALTER TABLE \"pupil__new\" RENAME TO \"pupil\"");

    let junction = sql
        .iter()
        .position(|s| s.starts_with("INSERT INTO \"course_pupil__new\""))
        .unwrap();
    assert_eq!(
        sql[junction],
        "INSERT INTO \"course_pupil__new\" (\"course_name\", \"course_semester\", \"pupil\") \
         SELECT \"course_name\", \"course_semester\", \"student\" FROM \"course_pupil\""
    );
}

#[test]
fn test_sqlite_rebuild_backfills_through_the_copy() {
    let mut new = university();
    {
        let attr = attribute_mut(&mut new, "Course", "description");
        attr.kind = AttrKind::Required;
        attr.initial = Some(Value::String("Empty description".into()));
    }
    column_mut(&mut new, "course", "description").nullable = false;

    let ops = diff_with(SqliteDialect::new(), &university(), &new, &RenameHints::new());
    let sql = statements(&ops);

    assert!(!ops.iter().any(|op| op.kind == OpKind::SetDefaults));
    assert_eq!(
        sql[1],
        "INSERT INTO \"course__new\" (\"name\", \"semester\", \"lect_hours\", \"description\", \"dept\") \
         SELECT \"name\", \"semester\", \"lect_hours\", \
         COALESCE(NULLIF(\"description\", ''), 'Empty description'), \"dept\" FROM \"course\""
    );
    assert_eq!(
        sql.last().map(String::as_str),
        Some("CREATE TRIGGER \"trg_course__touch\" BEFORE UPDATE ON \"course\" FOR EACH ROW BEGIN touch_course() END")
    );
}

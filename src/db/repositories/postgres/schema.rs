//! Diesel table definitions matching the migrations in `migrations/`.

diesel::table! {
    students (id) {
        id -> Int8,
        external_ref -> Text,
        name -> Text,
    }
}

diesel::table! {
    courses (id) {
        id -> Int8,
        code -> Text,
        name -> Text,
        department -> Text,
    }
}

diesel::table! {
    assessments (id) {
        id -> Int8,
        course_id -> Int8,
        name -> Text,
        weight -> Float8,
        max_score -> Float8,
        active -> Bool,
    }
}

diesel::table! {
    learning_outcomes (id) {
        id -> Int8,
        course_id -> Int8,
        code -> Text,
        description -> Text,
        target_percentage -> Float8,
        active -> Bool,
    }
}

diesel::table! {
    program_outcomes (id) {
        id -> Int8,
        department -> Text,
        code -> Text,
        description -> Text,
        target_percentage -> Float8,
        active -> Bool,
    }
}

diesel::table! {
    enrollments (student_id, course_id) {
        student_id -> Int8,
        course_id -> Int8,
        active -> Bool,
    }
}

diesel::table! {
    grades (student_id, assessment_id) {
        student_id -> Int8,
        assessment_id -> Int8,
        score -> Float8,
    }
}

diesel::table! {
    assessment_lo_links (assessment_id, learning_outcome_id) {
        assessment_id -> Int8,
        learning_outcome_id -> Int8,
        course_id -> Int8,
        weight -> Float8,
    }
}

diesel::table! {
    lo_po_links (learning_outcome_id, program_outcome_id) {
        learning_outcome_id -> Int8,
        program_outcome_id -> Int8,
        weight -> Float8,
    }
}

diesel::table! {
    student_lo_achievements (student_id, learning_outcome_id) {
        student_id -> Int8,
        learning_outcome_id -> Int8,
        current_percentage -> Float8,
        total_assessments -> Int4,
        completed_assessments -> Int4,
        last_calculated -> Timestamptz,
    }
}

diesel::table! {
    student_po_achievements (student_id, program_outcome_id) {
        student_id -> Int8,
        program_outcome_id -> Int8,
        current_percentage -> Float8,
        total_assessments -> Int4,
        completed_assessments -> Int4,
        last_calculated -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    students,
    courses,
    assessments,
    learning_outcomes,
    program_outcomes,
    enrollments,
    grades,
    assessment_lo_links,
    lo_po_links,
    student_lo_achievements,
    student_po_achievements,
);

//! Exportable C/MPI program equivalent to the simulated run.
//!
//! The generated program splits rows of `A` into blocks of
//! `N / NUM_PROCESSES` and therefore only works when `N` is a multiple of the
//! process count. That is not checked here; the simulation itself tolerates
//! uneven splits.

/// Suggested download name for the generated source.
pub fn file_name(worker_count: usize, matrix_size: usize) -> String {
    format!(
        "matrix_multiplication_mpi_{}proc_{}x{}.c",
        worker_count, matrix_size, matrix_size
    )
}

/// Renders the C/MPI source for `(W, N)`.
pub fn generate(worker_count: usize, matrix_size: usize) -> String {
    let rows_each = if worker_count == 0 {
        0
    } else {
        matrix_size / worker_count
    };
    let file = file_name(worker_count, matrix_size);

    let mut src = String::new();
    src.push_str(HEADER);
    src.push_str(&format!(
        "#define N {}\n#define NUM_PROCESSES {}\n\n",
        matrix_size, worker_count
    ));
    src.push_str(BODY);
    src.push_str(&format!(
        r#"
/*
 * Compile: mpicc -o matrix_mult {file}
 * Run:     mpirun -np {w} ./matrix_mult
 *
 * {w} processes, each computing {rows} row(s) of the {n}x{n} result.
 *
 * Distribution:
 *   - rank 0 fills A and B
 *   - row blocks of A are sent to every other rank
 *   - B is broadcast to all ranks
 *   - each rank multiplies its block
 *   - result blocks are sent back to rank 0 and printed
 */
"#,
        file = file,
        w = worker_count,
        rows = rows_each,
        n = matrix_size
    ));
    src
}

const HEADER: &str = r#"#include <mpi.h>
#include <stdio.h>
#include <stdlib.h>
#include <time.h>
#include <unistd.h>

"#;

const BODY: &str = r#"static void fill_random(double m[N][N]) {
    srand((unsigned) time(NULL) + (unsigned) getpid());
    for (int i = 0; i < N; i++)
        for (int j = 0; j < N; j++)
            m[i][j] = (double) (rand() % 10);
}

static void print_matrix(double m[N][N], const char *label) {
    printf("\n%s:\n", label);
    for (int i = 0; i < N; i++) {
        for (int j = 0; j < N; j++)
            printf("%6.2f ", m[i][j]);
        printf("\n");
    }
}

int main(int argc, char **argv) {
    int rank, size;
    static double A[N][N], B[N][N], C[N][N];
    static double block_A[N / NUM_PROCESSES][N], block_C[N / NUM_PROCESSES][N];
    const int rows = N / NUM_PROCESSES;

    MPI_Init(&argc, &argv);
    MPI_Comm_rank(MPI_COMM_WORLD, &rank);
    MPI_Comm_size(MPI_COMM_WORLD, &size);

    if (size != NUM_PROCESSES) {
        if (rank == 0)
            printf("Run with exactly %d processes.\n", NUM_PROCESSES);
        MPI_Finalize();
        return 1;
    }

    /* Scatter: row blocks of A */
    if (rank == 0) {
        fill_random(A);
        fill_random(B);
        print_matrix(A, "Matrix A");
        print_matrix(B, "Matrix B");
        for (int p = 1; p < NUM_PROCESSES; p++)
            MPI_Send(&A[p * rows][0], rows * N, MPI_DOUBLE, p, 0, MPI_COMM_WORLD);
        for (int i = 0; i < rows; i++)
            for (int j = 0; j < N; j++)
                block_A[i][j] = A[i][j];
    } else {
        MPI_Recv(&block_A[0][0], rows * N, MPI_DOUBLE, 0, 0, MPI_COMM_WORLD, MPI_STATUS_IGNORE);
    }
    MPI_Bcast(&B[0][0], N * N, MPI_DOUBLE, 0, MPI_COMM_WORLD);

    /* Compute */
    printf("Rank %d: computing %d row(s)\n", rank, rows);
    for (int i = 0; i < rows; i++)
        for (int j = 0; j < N; j++) {
            double sum = 0.0;
            for (int k = 0; k < N; k++)
                sum += block_A[i][k] * B[k][j];
            block_C[i][j] = sum;
        }

    /* Gather */
    if (rank == 0) {
        for (int i = 0; i < rows; i++)
            for (int j = 0; j < N; j++)
                C[i][j] = block_C[i][j];
        for (int p = 1; p < NUM_PROCESSES; p++)
            MPI_Recv(&C[p * rows][0], rows * N, MPI_DOUBLE, p, 1, MPI_COMM_WORLD, MPI_STATUS_IGNORE);
        print_matrix(C, "Result C = A x B");
        printf("\nDone.\n");
    } else {
        MPI_Send(&block_C[0][0], rows * N, MPI_DOUBLE, 0, 1, MPI_COMM_WORLD);
    }

    MPI_Finalize();
    return 0;
}
"#;
